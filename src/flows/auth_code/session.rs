// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet},
	flows::{
		PkceChallenge, PkceCodeChallengeMethod,
		common::{self, STATE_LEN},
	},
	provider::ProviderDescriptor,
};

/// Authorization Code + PKCE handshake material produced by
/// [`FlowEngine::start_authorization`](crate::flows::FlowEngine::start_authorization).
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Scopes placed on the authorization URL.
	pub scope: ScopeSet,
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Redirect URI placed on the authorization URL and repeated in the code exchange.
	pub redirect_uri: Url,
	/// Fully-formed authorization URL to send the user to.
	pub authorize_url: Url,
	pkce: PkceChallenge,
}
impl AuthorizationSession {
	pub(crate) fn new(
		descriptor: &ProviderDescriptor,
		client_id: &ClientId,
		scope: ScopeSet,
		redirect_uri: Url,
	) -> Self {
		let state = common::random_string(STATE_LEN);
		let pkce = PkceChallenge::generate();
		let authorize_url =
			build_authorize_url(descriptor, client_id, &redirect_uri, &scope, &state, &pkce);

		Self { scope, state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		self.pkce.challenge()
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method()
	}

	/// Validates the returned `state` parameter.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<()> {
		if returned_state == Some(self.state.as_str()) { Ok(()) } else { Err(Error::StateMismatch) }
	}

	pub(crate) fn verifier(&self) -> &str {
		self.pkce.verifier()
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("scope", &self.scope)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("pkce", &self.pkce)
			.finish()
	}
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &ClientId,
	redirect_uri: &Url,
	scope: &ScopeSet,
	state: &str,
	pkce: &PkceChallenge,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id.as_ref());
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if !scope.is_empty() {
		pairs.append_pair("scope", &scope.normalized());
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", pkce.challenge());
	pairs.append_pair("code_challenge_method", pkce.method().as_str());

	for (key, value) in &descriptor.authorization_params {
		pairs.append_pair(key, value);
	}

	drop(pairs);

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::TenantId,
		provider::{ProviderCredentials, ProviderKind},
	};

	fn session(kind: ProviderKind, credentials: ProviderCredentials) -> AuthorizationSession {
		let descriptor = kind.resolve(&credentials).expect("Descriptor fixture should resolve.");

		AuthorizationSession::new(
			&descriptor,
			&ClientId::new("app").expect("Client id fixture should be valid."),
			ScopeSet::new(["openid", "profile"]).expect("Scope fixture should be valid."),
			Url::parse("http://localhost:8080/callback").expect("Redirect fixture should parse."),
		)
	}

	#[test]
	fn authorize_url_carries_pkce_state_and_provider_params() {
		let session = session(
			ProviderKind::Microsoft,
			ProviderCredentials::default()
				.with_tenant_id(TenantId::new("contoso").expect("Tenant fixture should be valid.")),
		);
		let query = session.authorize_url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

		assert_eq!(session.authorize_url.path(), "/contoso/oauth2/v2.0/authorize");
		assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(query.get("client_id").map(String::as_str), Some("app"));
		assert_eq!(
			query.get("redirect_uri").map(String::as_str),
			Some("http://localhost:8080/callback")
		);
		assert_eq!(query.get("scope").map(String::as_str), Some("openid profile"));
		assert_eq!(query.get("state"), Some(&session.state));
		assert_eq!(query.get("code_challenge").map(String::as_str), Some(session.code_challenge()));
		assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(query.get("response_mode").map(String::as_str), Some("query"));
		assert!(PkceChallenge::verify(session.verifier(), session.code_challenge()));
	}

	#[test]
	fn state_validation_rejects_missing_or_foreign_values() {
		let session = session(ProviderKind::Salesforce, ProviderCredentials::default());

		assert_eq!(session.state.len(), STATE_LEN);
		assert!(session.validate_state(Some(&session.state)).is_ok());
		assert!(matches!(session.validate_state(Some("forged")), Err(Error::StateMismatch)));
		assert!(matches!(session.validate_state(None), Err(Error::StateMismatch)));
		assert!(!session.authorize_url.query_pairs().any(|(key, _)| key == "response_mode"));
	}

	#[test]
	fn debug_output_hides_the_verifier() {
		let session = session(ProviderKind::Salesforce, ProviderCredentials::default());

		assert!(!format!("{session:?}").contains(session.verifier()));
	}
}
