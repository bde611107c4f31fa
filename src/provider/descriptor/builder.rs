// std
use std::{
	iter::IntoIterator,
	net::{Ipv4Addr, Ipv6Addr},
};
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{
		GrantType, ProviderDescriptor, ProviderEndpoints, ProviderKind, ScopeConvention,
		SupportedGrants,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required for Authorization Code flows.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for all flows.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// At least one grant must be supported.
	#[error("Descriptor must enable at least one grant type.")]
	NoSupportedGrants,
	/// Endpoints must use HTTPS unless they point at the local machine.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Device-code support was declared without a device authorization endpoint.
	#[error("The device_code grant requires a device authorization endpoint.")]
	DeviceCodeWithoutEndpoint,
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Provider family.
	pub kind: ProviderKind,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for every exchange.
	pub token_endpoint: Option<Url>,
	/// Optional OpenID Connect discovery document.
	pub metadata_endpoint: Option<Url>,
	/// Optional device authorization endpoint.
	pub device_code_endpoint: Option<Url>,
	/// Grants enabled for the provider.
	pub supported_grants: SupportedGrants,
	/// Scope convention (defaults to free-form).
	pub scope_convention: ScopeConvention,
	/// Extra authorization URL parameters.
	pub authorization_params: Vec<(String, String)>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier and family.
	pub fn new(id: ProviderId, kind: ProviderKind) -> Self {
		Self {
			id,
			kind,
			authorization_endpoint: None,
			token_endpoint: None,
			metadata_endpoint: None,
			device_code_endpoint: None,
			supported_grants: SupportedGrants::default(),
			scope_convention: ScopeConvention::default(),
			authorization_params: Vec::new(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the discovery metadata endpoint.
	pub fn metadata_endpoint(mut self, url: Url) -> Self {
		self.metadata_endpoint = Some(url);

		self
	}

	/// Sets the device authorization endpoint.
	pub fn device_code_endpoint(mut self, url: Url) -> Self {
		self.device_code_endpoint = Some(url);

		self
	}

	/// Marks a single grant type as supported.
	pub fn support_grant(mut self, grant: GrantType) -> Self {
		self.supported_grants = self.supported_grants.enable(grant);

		self
	}

	/// Marks multiple grants as supported.
	pub fn support_grants<I>(mut self, grants: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		for grant in grants.into_iter() {
			self.supported_grants = self.supported_grants.enable(grant);
		}

		self
	}

	/// Overrides the scope convention.
	pub fn scope_convention(mut self, convention: ScopeConvention) -> Self {
		self.scope_convention = convention;

		self
	}

	/// Appends an extra authorization URL parameter.
	pub fn authorization_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.authorization_params.push((key.into(), value.into()));

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let endpoints = ProviderEndpoints {
			authorization,
			token,
			metadata: self.metadata_endpoint,
			device_code: self.device_code_endpoint,
		};
		let descriptor = ProviderDescriptor {
			id: self.id,
			kind: self.kind,
			endpoints,
			supported_grants: self.supported_grants,
			scope_convention: self.scope_convention,
			authorization_params: self.authorization_params,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.supported_grants.is_empty() {
			return Err(ProviderDescriptorError::NoSupportedGrants);
		}
		if self.supports(GrantType::DeviceCode) && self.endpoints.device_code.is_none() {
			return Err(ProviderDescriptorError::DeviceCodeWithoutEndpoint);
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		if let Some(metadata) = self.endpoints.metadata.as_ref() {
			validate_endpoint("metadata", metadata)?;
		}
		if let Some(device_code) = self.endpoints.device_code.as_ref() {
			validate_endpoint("device_code", device_code)?;
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ =>
			Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

pub(crate) fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback() || addr == Ipv4Addr::UNSPECIFIED,
		Some(url::Host::Ipv6(addr)) => addr.is_loopback() || addr == Ipv6Addr::UNSPECIFIED,
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder(
			ProviderId::new("builder-test").expect("Provider id fixture should be valid."),
			ProviderKind::Custom,
		)
	}

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn loopback_http_is_allowed_but_remote_http_is_not() {
		let local = builder()
			.authorization_endpoint(url("http://127.0.0.1:9000/authorize"))
			.token_endpoint(url("http://localhost:9000/token"))
			.support_grant(GrantType::ClientCredentials)
			.build();

		assert!(local.is_ok());

		let err = builder()
			.authorization_endpoint(url("https://idp.example.com/authorize"))
			.token_endpoint(url("http://idp.example.com/token"))
			.support_grant(GrantType::ClientCredentials)
			.build()
			.expect_err("Remote plain-HTTP token endpoints must be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));
	}

	#[test]
	fn device_code_support_requires_its_endpoint() {
		let err = builder()
			.authorization_endpoint(url("https://idp.example.com/authorize"))
			.token_endpoint(url("https://idp.example.com/token"))
			.support_grant(GrantType::DeviceCode)
			.build()
			.expect_err("Device code without an endpoint must be rejected.");

		assert_eq!(err, ProviderDescriptorError::DeviceCodeWithoutEndpoint);
	}
}
