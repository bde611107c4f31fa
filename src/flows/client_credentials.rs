//! Client Credentials flow orchestration.
//!
//! The engine exposes [`FlowEngine::client_credentials`] for app-only tokens. The client
//! secret and grant support are checked before any network traffic, the requested scope is
//! formatted per the provider's convention (falling back to its default when empty), and the
//! token endpoint is called exactly once.

// self
use crate::{
	_prelude::*,
	auth::TokenResponse,
	error::ConfigError,
	flows::{FlowEngine, FlowRequest, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::GrantType,
};

impl<C, M> FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs the `client_credentials` grant.
	pub async fn client_credentials(&self, request: &FlowRequest) -> Result<TokenResponse> {
		let _attempt = self.claim()?;

		self.client_credentials_unguarded(request).await
	}

	/// Client Credentials exchange for callers that already hold the attempt guard.
	pub(crate) async fn client_credentials_unguarded(
		&self,
		request: &FlowRequest,
	) -> Result<TokenResponse> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "client_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.in_span(async move {
				let grant = GrantType::ClientCredentials;

				common::ensure_supported(self, grant)?;

				if request.secret().is_none() {
					return Err(ConfigError::MissingClientSecret { grant }.into());
				}

				let formatted = self.descriptor.format_scope(grant, &request.scope);

				common::log_scope_findings(grant, &formatted.warnings, &formatted.notes);
				tracing::info!(scope = %formatted.scope, "Requesting app-only token.");

				let facade = self.facade(request);

				facade.exchange_client_credentials(&formatted.scope).await
			})
			.await;

		if let Err(e) = &result {
			tracing::warn!(error = %e, "Client Credentials flow failed.");
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}
}
