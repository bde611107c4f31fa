//! Authorization Code + PKCE flow: build the authorization URL, capture the redirect on a
//! loopback listener, and exchange the code.

mod session;

pub use session::*;

// std
use std::io::Result as IoResult;
// self
use crate::{
	_prelude::*,
	auth::TokenResponse,
	callback::{AuthorizationResult, CallbackListener},
	flows::{FlowEngine, FlowRequest, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::GrantType,
};

/// Progress of a single Authorization Code attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationPhase {
	/// Nothing has been sent yet.
	Idle,
	/// Listener is bound and the user is at the provider.
	AwaitingRedirect,
	/// Redirect captured; the code is being exchanged.
	ExchangingCode,
	/// Tokens received.
	Complete,
	/// Attempt ended with an error.
	Failed,
}
impl AuthorizationPhase {
	/// Stable label used in logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthorizationPhase::Idle => "idle",
			AuthorizationPhase::AwaitingRedirect => "awaiting_redirect",
			AuthorizationPhase::ExchangingCode => "exchanging_code",
			AuthorizationPhase::Complete => "complete",
			AuthorizationPhase::Failed => "failed",
		}
	}

	fn advance(&mut self, next: AuthorizationPhase) {
		tracing::info!(from = self.as_str(), to = next.as_str(), "Authorization phase changed.");

		*self = next;
	}
}

/// Sends the user to the authorization URL.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Opens `url` for the user; failures are reported but never end the attempt.
	fn launch(&self, url: &Url) -> IoResult<()>;
}

/// Opens the platform's default browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;
impl BrowserLauncher for SystemBrowser {
	fn launch(&self, url: &Url) -> IoResult<()> {
		open::that(url.as_str())
	}
}

impl<C, M> FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Generates state + PKCE and builds the authorization URL for `redirect_uri`.
	///
	/// Scope warnings from the provider's convention are logged, never fatal.
	pub fn start_authorization(
		&self,
		request: &FlowRequest,
		redirect_uri: Url,
	) -> AuthorizationSession {
		let grant = GrantType::AuthorizationCode;
		let formatted = self.descriptor.format_scope(grant, &request.scope);

		common::log_scope_findings(grant, &formatted.warnings, &formatted.notes);

		AuthorizationSession::new(&self.descriptor, &request.client_id, formatted.scope, redirect_uri)
	}

	/// Exchanges `code` at the token endpoint using the session's PKCE verifier.
	///
	/// Consumes the session so the verifier is dropped once the exchange finishes.
	pub async fn exchange_code(
		&self,
		request: &FlowRequest,
		session: AuthorizationSession,
		code: &str,
	) -> Result<TokenResponse> {
		let facade = self.facade(request);

		facade.exchange_authorization_code(code, session.verifier(), &session.redirect_uri).await
	}

	/// Runs the full Authorization Code + PKCE flow.
	///
	/// The listener is bound before `launcher` sees the URL. With port `0` the redirect URI is
	/// rewritten to the port the OS assigned. A second concurrent call on the same engine fails
	/// with [`ConfigError::AttemptInFlight`](crate::error::ConfigError::AttemptInFlight).
	pub async fn authorization_code(
		&self,
		request: &FlowRequest,
		launcher: &dyn BrowserLauncher,
	) -> Result<TokenResponse> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let _attempt = self.claim()?;
		let span = FlowSpan::new(KIND, "authorization_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let mut phase = AuthorizationPhase::Idle;
		let result = span.in_span(self.drive_authorization(request, launcher, &mut phase)).await;

		match &result {
			Ok(_) => phase.advance(AuthorizationPhase::Complete),
			Err(e) => {
				tracing::warn!(phase = phase.as_str(), error = %e, "Authorization Code flow failed.");

				phase.advance(AuthorizationPhase::Failed);
			},
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn drive_authorization(
		&self,
		request: &FlowRequest,
		launcher: &dyn BrowserLauncher,
		phase: &mut AuthorizationPhase,
	) -> Result<TokenResponse> {
		common::ensure_supported(self, GrantType::AuthorizationCode)?;

		if request.secret().is_none() {
			tracing::info!("No client secret supplied; relying on PKCE alone.");
		}

		let mut redirect_uri = request.resolved_redirect_uri()?;
		let listener = CallbackListener::bind(request.port, redirect_uri.path()).await?;

		if request.port == 0 {
			// Infallible for http URLs with a host, which `resolved_redirect_uri` guarantees.
			let _ = redirect_uri.set_port(Some(listener.port()));
		} else if redirect_uri.port_or_known_default() != Some(listener.port()) {
			tracing::warn!(
				redirect_uri = %redirect_uri,
				port = listener.port(),
				"Redirect URI port differs from the listener port; the redirect will not reach it."
			);
		}

		let session = self.start_authorization(request, redirect_uri);

		tracing::info!(url = %session.authorize_url, "Authorization URL ready.");

		phase.advance(AuthorizationPhase::AwaitingRedirect);

		if self.settings.open_browser {
			if let Err(e) = launcher.launch(&session.authorize_url) {
				tracing::warn!(error = %e, "Unable to open a browser; open the URL manually.");
			}
		} else {
			tracing::info!("Browser launch disabled; open the URL manually.");
		}

		let code = match listener.wait(&session.state, self.settings.listener_timeout).await? {
			AuthorizationResult::Code { code, .. } => code,
			AuthorizationResult::Denied { error, error_description, .. } =>
				return Err(Error::AuthorizationDenied { error, description: error_description }),
		};

		phase.advance(AuthorizationPhase::ExchangingCode);

		self.exchange_code(request, session, &code).await
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, error::ConfigError};

	struct Unreachable;
	impl BrowserLauncher for Unreachable {
		fn launch(&self, _: &Url) -> IoResult<()> {
			Err(std::io::Error::other("no browser in tests"))
		}
	}

	#[test]
	fn phase_transitions_are_recorded() {
		let mut phase = AuthorizationPhase::Idle;

		phase.advance(AuthorizationPhase::AwaitingRedirect);

		assert_eq!(phase, AuthorizationPhase::AwaitingRedirect);
		assert_eq!(phase.as_str(), "awaiting_redirect");
	}

	#[tokio::test]
	async fn launcher_failures_do_not_end_the_attempt() {
		let mut engine = build_reqwest_test_engine(mock_descriptor("http://127.0.0.1:9"));

		engine.settings.listener_timeout = Duration::from_millis(200);

		let err = engine
			.authorization_code(&test_flow_request("app"), &Unreachable)
			.await
			.expect_err("Nobody redirects, so the attempt should time out.");

		assert!(matches!(err, Error::AuthorizationTimeout { .. }));
	}

	#[tokio::test]
	async fn concurrent_attempts_on_one_engine_are_rejected() {
		let mut engine = build_reqwest_test_engine(mock_descriptor("http://127.0.0.1:9"));

		engine.settings.listener_timeout = Duration::from_millis(500);

		let request = test_flow_request("app");
		let (first, second) = tokio::join!(
			engine.authorization_code(&request, &Unreachable),
			async {
				tokio::time::sleep(Duration::from_millis(50)).await;

				engine.authorization_code(&request, &Unreachable).await
			}
		);

		assert!(matches!(first, Err(Error::AuthorizationTimeout { .. })));
		assert!(matches!(second, Err(Error::Config(ConfigError::AttemptInFlight))));
	}
}
