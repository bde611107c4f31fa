//! Per-provider scope conventions: defaults, recommendations, and soft validation.

// self
use crate::{_prelude::*, auth::ScopeSet, provider::GrantType};

const MICROSOFT_CLIENT_CREDENTIALS_DEFAULT: &str = "https://graph.microsoft.com/.default";
const MICROSOFT_KNOWN_PREFIXES: &[&str] = &[
	"https://graph.microsoft.com/",
	"https://outlook.office.com/",
	"https://management.azure.com/",
];
const MICROSOFT_KNOWN_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];
const MICROSOFT_RECOMMENDED_AUTH_CODE: &[&str] = &[
	"https://graph.microsoft.com/Sites.Read.All",
	"https://graph.microsoft.com/Files.ReadWrite.All",
	"offline_access",
];
const MICROSOFT_RECOMMENDED_CLIENT_CREDENTIALS: &[&str] = &[
	"https://graph.microsoft.com/.default",
	"https://graph.microsoft.com/Sites.Read.All",
	"https://graph.microsoft.com/Sites.ReadWrite.All",
	"https://graph.microsoft.com/Files.Read.All",
	"https://graph.microsoft.com/Files.ReadWrite.All",
];
const SALESFORCE_CLIENT_CREDENTIALS_DEFAULT: &str = "api";
const SALESFORCE_KNOWN_SCOPES: &[&str] = &[
	"api",
	"web",
	"full",
	"chatter_api",
	"custom_permissions",
	"refresh_token",
	"offline_access",
	"openid",
	"profile",
	"email",
	"address",
	"phone",
	"id",
	"visualforce",
	"content",
	"wave_api",
	"eclair_api",
	"lightning",
	"cdp_ingest_api",
	"cdp_profile_api",
	"cdp_query_api",
	"cdp_segment_api",
	"pardot_api",
];
const SALESFORCE_RECOMMENDED_AUTH_CODE: &[&str] =
	&["api", "refresh_token", "offline_access", "openid", "profile"];
const SALESFORCE_RECOMMENDED_CLIENT_CREDENTIALS: &[&str] = &["api", "web", "refresh_token"];

/// How a provider expects `scope` values to be spelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeConvention {
	/// Resource-qualified URIs (`https://graph.microsoft.com/Files.Read`); app-only tokens
	/// require the `/.default` form.
	ResourceUri,
	/// Short bare names (`api`, `refresh_token`).
	BareName,
	/// No known convention; scopes pass through untouched.
	#[default]
	FreeForm,
}
impl ScopeConvention {
	/// Scope assumed for Client Credentials when the caller supplies none.
	pub fn client_credentials_default(self) -> Option<&'static str> {
		match self {
			ScopeConvention::ResourceUri => Some(MICROSOFT_CLIENT_CREDENTIALS_DEFAULT),
			ScopeConvention::BareName => Some(SALESFORCE_CLIENT_CREDENTIALS_DEFAULT),
			ScopeConvention::FreeForm => None,
		}
	}

	/// Scopes worth trying first for `grant`.
	pub fn recommended(self, grant: GrantType) -> &'static [&'static str] {
		match (self, grant) {
			(ScopeConvention::ResourceUri, GrantType::ClientCredentials) =>
				MICROSOFT_RECOMMENDED_CLIENT_CREDENTIALS,
			(ScopeConvention::ResourceUri, _) => MICROSOFT_RECOMMENDED_AUTH_CODE,
			(ScopeConvention::BareName, GrantType::ClientCredentials) =>
				SALESFORCE_RECOMMENDED_CLIENT_CREDENTIALS,
			(ScopeConvention::BareName, _) => SALESFORCE_RECOMMENDED_AUTH_CODE,
			(ScopeConvention::FreeForm, _) => &[],
		}
	}

	/// Returns true when `scope` belongs to the provider's known vocabulary.
	pub fn is_known(self, scope: &str) -> bool {
		match self {
			ScopeConvention::ResourceUri =>
				MICROSOFT_KNOWN_SCOPES.contains(&scope)
					|| MICROSOFT_KNOWN_PREFIXES.iter().any(|prefix| scope.starts_with(prefix)),
			ScopeConvention::BareName => SALESFORCE_KNOWN_SCOPES.contains(&scope),
			ScopeConvention::FreeForm => true,
		}
	}

	/// Splits `requested` on whitespace and checks it against the convention for `grant`.
	///
	/// Never fails: unknown or malformed scopes are forwarded as typed and only described in
	/// [`FormattedScope::warnings`].
	pub fn format(self, grant: GrantType, requested: &str) -> FormattedScope {
		let mut formatted = FormattedScope::default();
		let tokens = requested.split_whitespace().collect::<Vec<_>>();

		if tokens.is_empty() {
			match (grant, self.client_credentials_default()) {
				(GrantType::ClientCredentials, Some(default)) => {
					formatted.scope = ScopeSet::new([default]).unwrap_or_default();
					formatted.defaulted = true;
					formatted.notes.push(format!("No scope provided, using default: {default}."));

					let recommended = self.recommended(grant);

					if !recommended.is_empty() {
						formatted
							.notes
							.push(format!("Recommended scopes: {}.", recommended.join(", ")));
					}
				},
				(GrantType::AuthorizationCode, _) => formatted
					.warnings
					.push("No scope requested; the provider may reject the authorization.".into()),
				_ => (),
			}

			return formatted;
		}

		// Tokens from `split_whitespace` are never empty and contain no whitespace.
		formatted.scope = ScopeSet::new(tokens.iter().copied()).unwrap_or_default();

		for scope in &formatted.scope {
			if !self.is_known(scope) {
				formatted.warnings.push(format!(
					"Scope `{scope}` may not be valid for this provider ({}).",
					self.label()
				));
			}
		}

		if self == ScopeConvention::ResourceUri && grant == GrantType::ClientCredentials {
			for scope in &formatted.scope {
				if !scope.ends_with("/.default") {
					formatted.warnings.push(format!(
						"Client Credentials scopes must use the `<resource>/.default` form; `{scope}` will likely be rejected."
					));
				}
			}
		} else if self == ScopeConvention::ResourceUri
			&& formatted.scope.iter().any(|scope| scope.ends_with("/.default"))
		{
			formatted
				.notes
				.push("Using a .default scope requests every permission granted to the app.".into());
		}

		formatted
	}

	fn label(self) -> &'static str {
		match self {
			ScopeConvention::ResourceUri => "resource URI scopes",
			ScopeConvention::BareName => "bare-name scopes",
			ScopeConvention::FreeForm => "free-form scopes",
		}
	}
}

/// Result of [`ScopeConvention::format`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattedScope {
	/// Scopes to send, in the order given.
	pub scope: ScopeSet,
	/// True when the provider default replaced an empty request.
	pub defaulted: bool,
	/// Problems worth surfacing; the request still goes out.
	pub warnings: Vec<String>,
	/// Informational remarks (defaults applied, recommendations).
	pub notes: Vec<String>,
}
impl FormattedScope {
	/// Space-delimited wire form.
	pub fn normalized(&self) -> String {
		self.scope.normalized()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_client_credentials_scope_uses_the_provider_default() {
		let formatted = ScopeConvention::ResourceUri.format(GrantType::ClientCredentials, "  ");

		assert!(formatted.defaulted);
		assert_eq!(formatted.normalized(), "https://graph.microsoft.com/.default");
		assert!(formatted.warnings.is_empty());
		assert!(!formatted.notes.is_empty());

		let salesforce = ScopeConvention::BareName.format(GrantType::ClientCredentials, "");

		assert_eq!(salesforce.normalized(), "api");
	}

	#[test]
	fn microsoft_client_credentials_scopes_must_end_in_default() {
		let formatted = ScopeConvention::ResourceUri
			.format(GrantType::ClientCredentials, "https://graph.microsoft.com/Files.Read.All");

		assert_eq!(formatted.normalized(), "https://graph.microsoft.com/Files.Read.All");
		assert_eq!(formatted.warnings.len(), 1);
		assert!(formatted.warnings[0].contains("/.default"));
	}

	#[test]
	fn unknown_scopes_warn_but_are_forwarded() {
		let formatted =
			ScopeConvention::BareName.format(GrantType::AuthorizationCode, "api bogus api");

		assert_eq!(formatted.normalized(), "api bogus");
		assert_eq!(formatted.warnings.len(), 1);
		assert!(formatted.warnings[0].contains("bogus"));
		assert!(!formatted.defaulted);
	}

	#[test]
	fn free_form_never_warns_about_vocabulary() {
		let formatted = ScopeConvention::FreeForm.format(GrantType::ClientCredentials, "read:all");

		assert_eq!(formatted.normalized(), "read:all");
		assert!(formatted.warnings.is_empty());
		assert!(ScopeConvention::FreeForm.format(GrantType::ClientCredentials, "").scope.is_empty());
	}
}
