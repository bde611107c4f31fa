//! Flow orchestrators: Authorization Code + PKCE and Client Credentials.

pub mod auth_code;
mod common;
pub mod pkce;

mod client_credentials;

pub use auth_code::*;
pub use pkce::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, Secret},
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	provider::{ProviderDescriptor, is_loopback},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Redirect URI used when the caller does not pick one.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
/// Callback listener port used when the caller does not pick one.
pub const DEFAULT_PORT: u16 = 8080;

#[cfg(feature = "reqwest")]
/// Engine specialized for the crate's default reqwest transport stack.
pub type ReqwestFlowEngine = FlowEngine<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Timeouts and toggles shared by every attempt on an engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
	/// How long the callback listener waits for the redirect.
	#[serde(with = "duration_secs")]
	pub listener_timeout: Duration,
	/// Timeout applied to token exchanges.
	#[serde(with = "duration_secs")]
	pub http_timeout: Duration,
	/// Timeout applied to each discovery request.
	#[serde(with = "duration_secs")]
	pub discovery_timeout: Duration,
	/// Hand the authorization URL to the browser launcher.
	pub open_browser: bool,
}
impl Default for FlowSettings {
	fn default() -> Self {
		Self {
			listener_timeout: Duration::from_secs(300),
			http_timeout: Duration::from_secs(30),
			discovery_timeout: Duration::from_secs(10),
			open_browser: true,
		}
	}
}

/// Per-attempt inputs: who the client is and where the redirect lands.
#[derive(Clone)]
pub struct FlowRequest {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// Client secret; required for Client Credentials, optional for Authorization Code.
	pub client_secret: Option<Secret>,
	/// Space-delimited scope string as typed.
	pub scope: String,
	/// Redirect URI registered with the provider (defaults to [`DEFAULT_REDIRECT_URI`]).
	pub redirect_uri: Option<Url>,
	/// Local listener port; `0` asks the OS for a free port.
	pub port: u16,
	/// Echo full request/response detail at `info` level.
	pub verbose: bool,
}
impl FlowRequest {
	/// Creates a request with the default redirect URI and port.
	pub fn new(client_id: ClientId) -> Self {
		Self {
			client_id,
			client_secret: None,
			scope: String::new(),
			redirect_uri: None,
			port: DEFAULT_PORT,
			verbose: false,
		}
	}

	/// Sets the client secret (ignored when empty).
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(Secret::new(secret)).filter(|secret| !secret.is_empty());

		self
	}

	/// Client secret, or `None` when it is absent or empty.
	pub fn secret(&self) -> Option<&Secret> {
		self.client_secret.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Sets the raw scope string.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = scope.into();

		self
	}

	/// Overrides the redirect URI.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Overrides the listener port.
	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;

		self
	}

	/// Toggles verbose echo.
	pub fn verbose(mut self, verbose: bool) -> Self {
		self.verbose = verbose;

		self
	}

	/// Resolves and validates the redirect URI the local listener must serve.
	pub fn resolved_redirect_uri(&self) -> Result<Url, ConfigError> {
		let redirect = match &self.redirect_uri {
			Some(uri) => uri.clone(),
			None => Url::parse(DEFAULT_REDIRECT_URI).map_err(|_| ConfigError::InvalidRedirect {
				uri: DEFAULT_REDIRECT_URI.into(),
				reason: "it does not parse",
			})?,
		};
		let invalid = |reason| ConfigError::InvalidRedirect { uri: redirect.to_string(), reason };

		if redirect.scheme() != "http" {
			return Err(invalid("the local listener only serves plain http"));
		}
		if !is_loopback(&redirect) {
			return Err(invalid("it must point at this machine (localhost or 127.0.0.1)"));
		}

		Ok(redirect)
	}
}
impl Debug for FlowRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowRequest")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.secret().is_some())
			.field("scope", &self.scope)
			.field("redirect_uri", &self.redirect_uri)
			.field("port", &self.port)
			.field("verbose", &self.verbose)
			.finish()
	}
}

/// Drives OAuth flows against a single provider descriptor.
///
/// The engine owns the HTTP client, the transport error mapper, and the descriptor so each
/// flow can focus on grant-specific logic (state + PKCE generation, the redirect wait, the
/// code exchange). At most one attempt runs per engine at a time; clones share the guard.
pub struct FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines endpoints and conventions.
	pub descriptor: ProviderDescriptor,
	/// Timeouts and toggles.
	pub settings: FlowSettings,
	attempt_guard: Arc<AsyncMutex<()>>,
}
impl<C, M> FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an engine that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		settings: FlowSettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			settings,
			attempt_guard: Default::default(),
		}
	}

	/// Claims the engine for one attempt or fails with [`ConfigError::AttemptInFlight`].
	pub(crate) fn claim(&self) -> Result<async_lock::MutexGuard<'_, ()>> {
		self.attempt_guard.try_lock().ok_or_else(|| ConfigError::AttemptInFlight.into())
	}

	pub(crate) fn facade(&self, request: &FlowRequest) -> BasicFacade<C, M> {
		BasicFacade::from_descriptor(
			&self.descriptor,
			&request.client_id,
			request.secret(),
			request.verbose,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl FlowEngine<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an engine with its own reqwest transport, configured with
	/// [`FlowSettings::http_timeout`] and redirects disabled.
	pub fn new(descriptor: ProviderDescriptor, settings: FlowSettings) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(settings.http_timeout)?;

		Ok(Self::with_http_client(
			descriptor,
			settings,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Clone for FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			descriptor: self.descriptor.clone(),
			settings: self.settings.clone(),
			attempt_guard: self.attempt_guard.clone(),
		}
	}
}
impl<C, M> Debug for FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowEngine")
			.field("descriptor", &self.descriptor)
			.field("settings", &self.settings)
			.finish()
	}
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(value.as_secs())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_secs)
	}
}
