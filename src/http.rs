//! Transport primitives for token exchanges and discovery probes.
//!
//! The module exposes [`TokenHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so callers can plug in custom HTTP clients without losing the
//! tester's diagnostics. Implementations call [`ResponseMetadataSlot::take`] before
//! dispatching a request and [`ResponseMetadataSlot::store`] once the status and body are
//! known, which lets the error mapper report exactly what the provider answered.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, header::AUTHORIZATION},
};
// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";
const SECRET_FORM_FIELDS: &[&str] = &["client_secret", "client_assertion", "password"];

/// Logs at `info` when the attempt is verbose and at `debug` otherwise.
macro_rules! echo {
	($verbose:expr, $($arg:tt)+) => {
		if $verbose {
			tracing::info!($($arg)+)
		} else {
			tracing::debug!($($arg)+)
		}
	};
}

/// Abstraction over HTTP transports capable of executing OAuth requests while publishing
/// response metadata back to the flow engine.
///
/// The trait is the crate's only dependency on an HTTP stack. Callers provide an
/// implementation and the engine requests short-lived [`AsyncHttpClient`] handles that each
/// carry a clone of a [`ResponseMetadataSlot`]. Implementations must be
/// `Send + Sync + 'static`, and the handles they return must own whatever state their
/// request futures need so those futures stay `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request.
	/// - Once a response (successful or not) arrives, save its status and body with
	///   [`ResponseMetadataSlot::store`].
	/// - Honor [`ResponseMetadataSlot::is_verbose`] when echoing traffic to the log; never echo
	///   client secrets.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures the most recent HTTP response for error mapping and reports.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Response body decoded as UTF-8 (lossy).
	pub body: Option<String>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// The engine creates a fresh slot for each request and reads it right after the request
/// resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot {
	inner: Arc<Mutex<Option<ResponseMetadata>>>,
	verbose: bool,
}
impl ResponseMetadataSlot {
	/// Creates an empty slot; `verbose` raises traffic echo from `debug` to `info`.
	pub fn new(verbose: bool) -> Self {
		Self { inner: Default::default(), verbose }
	}

	/// Whether the current attempt asked for verbose echo.
	pub fn is_verbose(&self) -> bool {
		self.verbose
	}

	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.inner.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.inner.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so any custom client passed in should disable redirect
/// following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with `timeout` applied to every request and redirects disabled.
	pub fn with_timeout(timeout: Duration) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[cfg(feature = "reqwest")]
/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

#[cfg(feature = "reqwest")]
/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			let verbose = inner.slot.is_verbose();

			inner.slot.take();

			echo!(
				verbose,
				method = %request.method(),
				uri = %request.uri(),
				headers = ?redact_headers(request.headers()),
				body = %redact_form(request.body()),
				"Sending request."
			);

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let bytes = response.bytes().await.map_err(Box::new)?;
			let body = String::from_utf8_lossy(&bytes).into_owned();

			echo!(
				verbose,
				status = status.as_u16(),
				headers = ?redact_headers(&headers),
				body = %body,
				"Received response."
			);

			inner.slot.store(ResponseMetadata { status: Some(status.as_u16()), body: Some(body) });

			let mut response_new = HttpResponse::new(bytes.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

/// Renders a form-encoded body with secret fields masked.
pub fn redact_form(body: &[u8]) -> String {
	url::form_urlencoded::parse(body)
		.map(|(key, value)| {
			let value: &str =
				if SECRET_FORM_FIELDS.contains(&key.as_ref()) { REDACTED } else { value.as_ref() };

			format!("{key}={value}")
		})
		.collect::<Vec<_>>()
		.join("&")
}

/// Collects headers into a printable map with credentials masked.
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
	headers
		.iter()
		.map(|(name, value)| {
			let value = if name == AUTHORIZATION {
				REDACTED.to_owned()
			} else {
				String::from_utf8_lossy(value.as_bytes()).into_owned()
			};

			(name.as_str().to_owned(), value)
		})
		.collect()
}
