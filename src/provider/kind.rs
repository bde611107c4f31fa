//! The closed set of provider families and how each resolves its endpoints.
//!
//! Known providers are a tagged variant rather than a trait hierarchy: every behavior that
//! differs per provider (`resolve`, `required_credentials`, scope convention) is an explicit
//! `match`, so each provider can be tested on its own.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TenantId},
	error::ConfigError,
	provider::{GrantType, ProviderDescriptor, ScopeConvention},
};

/// Production login host used when no Salesforce instance URL is supplied.
pub const SALESFORCE_DEFAULT_INSTANCE: &str = "https://login.salesforce.com";

const MICROSOFT_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// Identity provider families the tester understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// Microsoft identity platform (Azure AD / Entra ID v2.0 endpoints).
	Microsoft,
	/// Salesforce (production, sandbox, or My Domain instance).
	Salesforce,
	/// Hand-built descriptor for any other provider.
	Custom,
}
impl ProviderKind {
	/// Stable lowercase identifier (used on the command line).
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderKind::Microsoft => "microsoft",
			ProviderKind::Salesforce => "salesforce",
			ProviderKind::Custom => "custom",
		}
	}

	/// Human-readable provider name.
	pub const fn label(self) -> &'static str {
		match self {
			ProviderKind::Microsoft => "Microsoft",
			ProviderKind::Salesforce => "Salesforce",
			ProviderKind::Custom => "Custom",
		}
	}

	/// Credentials the provider needs before its endpoints can be resolved.
	pub fn required_credentials(self) -> &'static [CredentialRequirement] {
		const MICROSOFT: &[CredentialRequirement] = &[CredentialRequirement {
			credential: Credential::TenantId,
			required: true,
			default: None,
		}];
		const SALESFORCE: &[CredentialRequirement] = &[CredentialRequirement {
			credential: Credential::InstanceUrl,
			required: false,
			default: Some(SALESFORCE_DEFAULT_INSTANCE),
		}];

		match self {
			ProviderKind::Microsoft => MICROSOFT,
			ProviderKind::Salesforce => SALESFORCE,
			ProviderKind::Custom => &[],
		}
	}

	/// Resolves a concrete descriptor from the supplied credentials.
	///
	/// Fails with [`ConfigError`] before any network traffic when a required credential is
	/// missing or the endpoints it produces are not valid absolute URLs.
	pub fn resolve(self, credentials: &ProviderCredentials) -> Result<ProviderDescriptor> {
		match self {
			ProviderKind::Microsoft => resolve_microsoft(credentials),
			ProviderKind::Salesforce => resolve_salesforce(credentials),
			ProviderKind::Custom =>
				Err(ConfigError::UnresolvableProvider { provider: self.as_str() }.into()),
		}
	}

	/// Scope used when probing the device authorization endpoint during discovery.
	pub fn device_code_probe_scope(self) -> Option<&'static str> {
		match self {
			ProviderKind::Microsoft => Some("https://graph.microsoft.com/User.Read"),
			ProviderKind::Salesforce | ProviderKind::Custom => None,
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProviderKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"microsoft" | "azure" | "entra" => Ok(ProviderKind::Microsoft),
			"salesforce" => Ok(ProviderKind::Salesforce),
			_ => Err(ConfigError::UnknownProvider { name: s.to_owned() }),
		}
	}
}

/// Credential a provider may need to resolve its endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
	/// Directory tenant identifier.
	TenantId,
	/// Instance (My Domain / sandbox) base URL.
	InstanceUrl,
}
impl Credential {
	/// Command-line flag that supplies the credential.
	pub const fn flag(self) -> &'static str {
		match self {
			Credential::TenantId => "--tenant-id",
			Credential::InstanceUrl => "--instance-url",
		}
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Credential::TenantId => f.write_str("tenant id"),
			Credential::InstanceUrl => f.write_str("instance URL"),
		}
	}
}

/// Whether a credential is required and what it defaults to when optional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CredentialRequirement {
	/// Credential in question.
	pub credential: Credential,
	/// Resolution fails without it.
	pub required: bool,
	/// Value assumed when omitted.
	pub default: Option<&'static str>,
}

/// Provider-specific credentials supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
	/// Tenant identifier (Microsoft).
	pub tenant_id: Option<TenantId>,
	/// Instance URL or bare host (Salesforce).
	pub instance_url: Option<String>,
}
impl ProviderCredentials {
	/// Sets the tenant identifier.
	pub fn with_tenant_id(mut self, tenant: TenantId) -> Self {
		self.tenant_id = Some(tenant);

		self
	}

	/// Sets the instance URL (a bare host gets `https://` prepended).
	pub fn with_instance_url(mut self, instance: impl Into<String>) -> Self {
		self.instance_url = Some(instance.into());

		self
	}
}

fn resolve_microsoft(credentials: &ProviderCredentials) -> Result<ProviderDescriptor> {
	let kind = ProviderKind::Microsoft;
	let tenant = credentials.tenant_id.as_ref().ok_or(ConfigError::MissingCredential {
		provider: kind.label(),
		credential: Credential::TenantId,
	})?;
	let base = format!("{MICROSOFT_LOGIN_HOST}/{tenant}");
	let descriptor = ProviderDescriptor::builder(provider_id(kind)?, kind)
		.authorization_endpoint(endpoint("authorization", &format!("{base}/oauth2/v2.0/authorize"))?)
		.token_endpoint(endpoint("token", &format!("{base}/oauth2/v2.0/token"))?)
		.metadata_endpoint(endpoint(
			"metadata",
			&format!("{base}/v2.0/.well-known/openid-configuration"),
		)?)
		.device_code_endpoint(endpoint("device_code", &format!("{base}/oauth2/v2.0/devicecode"))?)
		.support_grants([
			GrantType::AuthorizationCode,
			GrantType::ClientCredentials,
			GrantType::RefreshToken,
			GrantType::DeviceCode,
		])
		.scope_convention(ScopeConvention::ResourceUri)
		.authorization_param("response_mode", "query")
		.build()
		.map_err(ConfigError::from)?;

	Ok(descriptor)
}

fn resolve_salesforce(credentials: &ProviderCredentials) -> Result<ProviderDescriptor> {
	let kind = ProviderKind::Salesforce;
	let instance = normalize_instance_url(credentials.instance_url.as_deref())?;
	let base = instance.as_str().trim_end_matches('/');
	let descriptor = ProviderDescriptor::builder(provider_id(kind)?, kind)
		.authorization_endpoint(endpoint(
			"authorization",
			&format!("{base}/services/oauth2/authorize"),
		)?)
		.token_endpoint(endpoint("token", &format!("{base}/services/oauth2/token"))?)
		.metadata_endpoint(endpoint("metadata", &format!("{base}/.well-known/openid-configuration"))?)
		.support_grants([
			GrantType::AuthorizationCode,
			GrantType::ClientCredentials,
			GrantType::RefreshToken,
		])
		.scope_convention(ScopeConvention::BareName)
		.build()
		.map_err(ConfigError::from)?;

	Ok(descriptor)
}

fn normalize_instance_url(raw: Option<&str>) -> Result<Url, ConfigError> {
	let value = raw.map(str::trim).filter(|value| !value.is_empty());
	let value = match value {
		Some(value) if value.starts_with("http://") || value.starts_with("https://") =>
			value.to_owned(),
		Some(host) => format!("https://{host}"),
		None => SALESFORCE_DEFAULT_INSTANCE.to_owned(),
	};

	Url::parse(&value).map_err(|source| ConfigError::InvalidInstanceUrl { value, source })
}

fn endpoint(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })
}

fn provider_id(kind: ProviderKind) -> Result<ProviderId, ConfigError> {
	ProviderId::new(kind.as_str()).map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tenant() -> TenantId {
		TenantId::new("contoso.onmicrosoft.com").expect("Tenant fixture should be valid.")
	}

	#[test]
	fn microsoft_requires_a_tenant() {
		let err = ProviderKind::Microsoft
			.resolve(&ProviderCredentials::default())
			.expect_err("Microsoft without a tenant must fail before any network call.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::MissingCredential { credential: Credential::TenantId, .. })
		));
	}

	#[test]
	fn microsoft_endpoints_embed_the_tenant() {
		let descriptor = ProviderKind::Microsoft
			.resolve(&ProviderCredentials::default().with_tenant_id(tenant()))
			.expect("Microsoft descriptor should resolve.");

		assert_eq!(
			descriptor.endpoints.token.as_str(),
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
		);
		assert_eq!(
			descriptor.endpoints.authorization.as_str(),
			"https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
		);
		assert!(descriptor.endpoints.device_code.is_some());
		assert!(descriptor.supports(GrantType::DeviceCode));
		assert_eq!(
			descriptor.authorization_params,
			vec![("response_mode".to_owned(), "query".to_owned())]
		);
	}

	#[test]
	fn salesforce_defaults_to_production_and_normalizes_bare_hosts() {
		let production = ProviderKind::Salesforce
			.resolve(&ProviderCredentials::default())
			.expect("Salesforce descriptor should resolve without an instance.");

		assert_eq!(
			production.endpoints.token.as_str(),
			"https://login.salesforce.com/services/oauth2/token"
		);

		let sandbox = ProviderKind::Salesforce
			.resolve(&ProviderCredentials::default().with_instance_url("test.salesforce.com/"))
			.expect("Bare sandbox host should resolve.");

		assert_eq!(
			sandbox.endpoints.authorization.as_str(),
			"https://test.salesforce.com/services/oauth2/authorize"
		);
		assert!(sandbox.endpoints.device_code.is_none());
	}

	#[test]
	fn salesforce_rejects_remote_plain_http_instances() {
		let err = ProviderKind::Salesforce
			.resolve(&ProviderCredentials::default().with_instance_url("http://acme.my.salesforce.com"))
			.expect_err("Plain HTTP instance URLs must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidDescriptor(_))));
	}

	#[test]
	fn requirements_and_names_are_per_provider() {
		assert!(ProviderKind::Microsoft.required_credentials()[0].required);
		assert_eq!(
			ProviderKind::Salesforce.required_credentials()[0].default,
			Some(SALESFORCE_DEFAULT_INSTANCE)
		);
		assert!(ProviderKind::Custom.required_credentials().is_empty());
		assert_eq!(ProviderKind::from_str("Microsoft").ok(), Some(ProviderKind::Microsoft));
		assert!(ProviderKind::from_str("okta").is_err());
		assert!(ProviderKind::Custom.resolve(&ProviderCredentials::default()).is_err());
	}
}
