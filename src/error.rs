//! Tester-level error types shared across providers, flows, the listener, and discovery.

// std
use std::io::Error as IoError;
// self
use crate::{
	_prelude::*,
	auth::IdentifierError,
	provider::{Credential, GrantType, ProviderDescriptorError},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs. Every variant ends the current attempt.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem detected before (or instead of) network traffic.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Redirect carried a `state` other than the one this attempt generated.
	#[error("State parameter mismatch; the redirect may be forged (CSRF).")]
	StateMismatch,
	/// No redirect arrived before the listener deadline.
	#[error(
		"Timed out after {}s waiting for the authorization redirect. Re-run the command to try again.",
		.waited.as_secs()
	)]
	AuthorizationTimeout {
		/// How long the listener waited.
		waited: Duration,
	},
	/// Provider redirected back with an `error` parameter.
	#[error("Authorization was denied: {error}{}.", describe(.description))]
	AuthorizationDenied {
		/// Provider error code, verbatim.
		error: String,
		/// Provider error description, verbatim.
		description: Option<String>,
	},
	/// Token endpoint rejected the exchange or answered without an access token.
	#[error(transparent)]
	TokenExchange(#[from] TokenExchangeError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Network(#[from] NetworkError),
	/// Operator interrupted the attempt.
	#[error("Operation cancelled by user.")]
	Cancelled,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] ProviderDescriptorError),
	/// A resolved endpoint is not a valid absolute URL.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be served by the local listener.
	#[error("Redirect URI `{uri}` is invalid: {reason}.")]
	InvalidRedirect {
		/// Offending URI.
		uri: String,
		/// Why it was rejected.
		reason: &'static str,
	},
	/// Provider name is not one of the known families.
	#[error("Unknown provider `{name}`; expected `microsoft` or `salesforce`.")]
	UnknownProvider {
		/// Name as supplied.
		name: String,
	},
	/// Provider cannot be resolved without a credential.
	#[error("{provider} requires a {credential} (pass {}).", .credential.flag())]
	MissingCredential {
		/// Provider label.
		provider: &'static str,
		/// Missing credential.
		credential: Credential,
	},
	/// Instance URL does not parse even after normalization.
	#[error("Instance URL `{value}` is invalid.")]
	InvalidInstanceUrl {
		/// Normalized value that failed to parse.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Grant needs a client secret and none was supplied.
	#[error("A client secret is required for the {} flow.", .grant.label())]
	MissingClientSecret {
		/// Grant that needs the secret.
		grant: GrantType,
	},
	/// Descriptor does not enable the requested grant.
	#[error("Provider `{descriptor}` does not enable the {} grant.", .grant.label())]
	UnsupportedGrant {
		/// Provider display name.
		descriptor: String,
		/// Disabled grant.
		grant: GrantType,
	},
	/// Client, tenant, or provider identifier is malformed.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] IdentifierError),
	/// Local callback port could not be bound.
	#[error("Unable to listen on 127.0.0.1:{port}.")]
	ListenerBind {
		/// Requested port.
		port: u16,
		/// Underlying socket failure.
		#[source]
		source: IoError,
	},
	/// Another attempt is already running on this engine.
	#[error("Another authorization attempt is already in flight on this engine.")]
	AttemptInFlight,
	/// Custom descriptors are built directly, never resolved from credentials.
	#[error("The {provider} provider kind cannot be resolved from credentials.")]
	UnresolvableProvider {
		/// Provider kind identifier.
		provider: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint rejection, carrying everything the provider said.
#[derive(Debug, ThisError)]
#[error(
	"Token endpoint rejected the {} request{}{}{}.",
	.grant.label(),
	status_suffix(.status),
	error_suffix(.error),
	describe(.error_description)
)]
pub struct TokenExchangeError {
	/// Grant being exchanged.
	pub grant: GrantType,
	/// HTTP status, when a response arrived.
	pub status: Option<u16>,
	/// OAuth `error` code from the body.
	pub error: Option<String>,
	/// OAuth `error_description` from the body.
	pub error_description: Option<String>,
	/// Raw response body, kept for diagnostics.
	pub body: Option<String>,
	/// Parsing or protocol failure behind the rejection.
	#[source]
	pub source: Option<BoxError>,
}
impl TokenExchangeError {
	/// Creates an empty rejection for `grant`.
	pub fn new(grant: GrantType) -> Self {
		Self {
			grant,
			status: None,
			error: None,
			error_description: None,
			body: None,
			source: None,
		}
	}

	/// Attaches the HTTP status.
	pub fn with_status(mut self, status: Option<u16>) -> Self {
		self.status = status;

		self
	}

	/// Attaches the raw body, filling `error`/`error_description` from it when it is an OAuth
	/// error document and they are not yet known.
	pub fn with_body(mut self, body: Option<String>) -> Self {
		if let Some(Ok(JsonValue::Object(map))) =
			body.as_deref().map(serde_json::from_str::<JsonValue>)
		{
			let field = |name: &str| map.get(name).and_then(JsonValue::as_str).map(str::to_owned);

			self.error = self.error.or_else(|| field("error"));
			self.error_description = self.error_description.or_else(|| field("error_description"));
		}

		self.body = body;

		self
	}

	/// Sets the OAuth error code and description.
	pub fn with_oauth_error(mut self, error: impl Into<String>, description: Option<String>) -> Self {
		self.error = Some(error.into());
		self.error_description = description;

		self
	}

	/// Attaches the underlying failure.
	pub fn with_source(mut self, src: impl 'static + Send + Sync + StdError) -> Self {
		self.source = Some(Box::new(src));

		self
	}
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint being called.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request did not finish in time.
	#[error("Request to {endpoint} timed out after {}s.", .after.as_secs())]
	Timeout {
		/// Endpoint being called.
		endpoint: String,
		/// Applied deadline.
		after: Duration,
	},
	/// Local I/O failure (listener socket).
	#[error("I/O error on the local callback listener.")]
	Io(#[from] IoError),
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: impl Display, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint: endpoint.to_string(), source: Box::new(src) }
	}
}

fn describe(description: &Option<String>) -> String {
	match description.as_deref() {
		Some(text) if !text.is_empty() => format!(" ({text})"),
		_ => String::new(),
	}
}

fn status_suffix(status: &Option<u16>) -> String {
	status.map(|code| format!(" with HTTP {code}")).unwrap_or_default()
}

fn error_suffix(error: &Option<String>) -> String {
	error.as_deref().map(|code| format!(": {code}")).unwrap_or_default()
}
