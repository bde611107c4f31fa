//! Token endpoint responses as handed to the inspector and report layers.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret},
	provider::GrantType,
};

/// Errors produced by [`TokenResponseBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenResponseBuilderError {
	/// Issued when no (or an empty) access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// Successful token endpoint response.
///
/// Built once by the flow engine from the provider's HTTP body and passed by value afterwards;
/// nothing in the crate mutates a response after construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Grant that produced the response.
	pub grant: GrantType,
	/// Access token; callers must avoid logging it.
	pub access_token: Secret,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: String,
	/// Lifetime in seconds, counted from [`issued_at`](Self::issued_at).
	pub expires_in: Option<u64>,
	/// Refresh token, if the provider issued one.
	pub refresh_token: Option<Secret>,
	/// OpenID Connect ID token, if the provider issued one.
	pub id_token: Option<Secret>,
	/// Raw granted `scope` string as returned by the provider.
	pub scope: Option<String>,
	/// Local instant the response was received.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Remaining provider-specific fields (Salesforce `instance_url`, Microsoft
	/// `ext_expires_in`, ...).
	pub extra: BTreeMap<String, JsonValue>,
}
impl TokenResponse {
	/// Returns a builder for the provided grant.
	pub fn builder(grant: GrantType) -> TokenResponseBuilder {
		TokenResponseBuilder::new(grant)
	}

	/// Absolute expiry derived from `issued_at + expires_in`.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let secs = i64::try_from(self.expires_in?).ok()?;

		self.issued_at.checked_add(time::Duration::seconds(secs))
	}

	/// Granted scopes parsed from the `scope` field (empty when absent).
	pub fn granted_scopes(&self) -> ScopeSet {
		self.scope.as_deref().and_then(|raw| ScopeSet::from_str(raw).ok()).unwrap_or_default()
	}

	/// Looks up a provider-specific field that is not part of RFC 6749 §5.1.
	pub fn extra_field(&self, name: &str) -> Option<&JsonValue> {
		self.extra.get(name)
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("grant", &self.grant)
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("refresh_token_present", &self.refresh_token.is_some())
			.field("id_token_present", &self.id_token.is_some())
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("extra", &self.extra.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Builder for [`TokenResponse`] values.
#[derive(Debug)]
pub struct TokenResponseBuilder {
	grant: GrantType,
	access_token: Option<Secret>,
	token_type: Option<String>,
	expires_in: Option<u64>,
	refresh_token: Option<Secret>,
	id_token: Option<Secret>,
	scope: Option<String>,
	issued_at: Option<OffsetDateTime>,
	extra: BTreeMap<String, JsonValue>,
}
impl TokenResponseBuilder {
	fn new(grant: GrantType) -> Self {
		Self {
			grant,
			access_token: None,
			token_type: None,
			expires_in: None,
			refresh_token: None,
			id_token: None,
			scope: None,
			issued_at: None,
			extra: BTreeMap::new(),
		}
	}

	/// Sets the access token value.
	pub fn access_token(mut self, value: impl Into<String>) -> Self {
		self.access_token = Some(Secret::new(value));

		self
	}

	/// Sets the token type.
	pub fn token_type(mut self, value: impl Into<String>) -> Self {
		self.token_type = Some(value.into());

		self
	}

	/// Sets the relative lifetime in seconds.
	pub fn expires_in(mut self, secs: u64) -> Self {
		self.expires_in = Some(secs);

		self
	}

	/// Sets the refresh token value.
	pub fn refresh_token(mut self, value: impl Into<String>) -> Self {
		self.refresh_token = Some(Secret::new(value));

		self
	}

	/// Sets the ID token value.
	pub fn id_token(mut self, value: impl Into<String>) -> Self {
		self.id_token = Some(Secret::new(value));

		self
	}

	/// Sets the raw granted scope string.
	pub fn scope(mut self, value: impl Into<String>) -> Self {
		self.scope = Some(value.into());

		self
	}

	/// Overrides the issued-at instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Adds provider-specific fields.
	pub fn extra(mut self, fields: BTreeMap<String, JsonValue>) -> Self {
		self.extra.extend(fields);

		self
	}

	/// Consumes the builder and validates the resulting response.
	pub fn build(self) -> Result<TokenResponse, TokenResponseBuilderError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(TokenResponseBuilderError::MissingAccessToken)?;

		Ok(TokenResponse {
			grant: self.grant,
			access_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			expires_in: self.expires_in,
			refresh_token: self.refresh_token,
			id_token: self.id_token,
			scope: self.scope,
			issued_at: self.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
			extra: self.extra,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_requires_a_non_empty_access_token() {
		assert_eq!(
			TokenResponse::builder(GrantType::ClientCredentials).build().unwrap_err(),
			TokenResponseBuilderError::MissingAccessToken
		);
		assert_eq!(
			TokenResponse::builder(GrantType::ClientCredentials)
				.access_token("")
				.build()
				.unwrap_err(),
			TokenResponseBuilderError::MissingAccessToken
		);
	}

	#[test]
	fn expiry_and_scopes_derive_from_response_fields() {
		let issued_at = OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.");
		let response = TokenResponse::builder(GrantType::AuthorizationCode)
			.access_token("at")
			.expires_in(3600)
			.scope("openid profile")
			.issued_at(issued_at)
			.build()
			.expect("Response fixture should build.");

		assert_eq!(response.token_type, "Bearer");
		assert_eq!(
			response.expires_at().map(OffsetDateTime::unix_timestamp),
			Some(1_700_003_600)
		);
		assert_eq!(response.granted_scopes().normalized(), "openid profile");
		assert!(!format!("{response:?}").contains("\"at\""));
	}
}
