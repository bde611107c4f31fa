//! Short-lived loopback HTTP endpoint that captures the authorization redirect.
//!
//! The listener is bound before the browser is sent anywhere, so a redirect can never race
//! the socket. It answers exactly one request on the callback path; anything else (favicon
//! probes, speculative preconnects) is answered with a 404 or simply left to time out
//! without consuming the attempt.

// std
use std::{
	io::{Error as IoError, ErrorKind},
	net::{Ipv4Addr, SocketAddr},
};
// crates.io
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	net::{TcpListener, TcpStream},
	task::JoinSet,
	time::Instant,
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, NetworkError},
};

/// How long a single connection may take to send its request head.
const HEAD_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the request head (request line plus headers).
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Parameters delivered to the redirect URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationResult {
	/// Provider issued an authorization code.
	Code {
		/// Single-use authorization code.
		code: String,
		/// `state` echoed by the provider, if any.
		state: Option<String>,
	},
	/// Provider (or user) refused the request.
	Denied {
		/// OAuth `error` code, verbatim.
		error: String,
		/// OAuth `error_description`, verbatim.
		error_description: Option<String>,
		/// `state` echoed by the provider, if any.
		state: Option<String>,
	},
}
impl AuthorizationResult {
	/// Interprets a redirect query string.
	///
	/// `error` wins over `code`; a query carrying neither is reported as `invalid_request`.
	pub fn from_query(query: &str) -> Self {
		let mut code = None;
		let mut state = None;
		let mut error = None;
		let mut error_description = None;

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			let slot = match key.as_ref() {
				"code" => &mut code,
				"state" => &mut state,
				"error" => &mut error,
				"error_description" => &mut error_description,
				_ => continue,
			};

			slot.get_or_insert_with(|| value.into_owned());
		}

		match (error, code) {
			(Some(error), _) => Self::Denied { error, error_description, state },
			(None, Some(code)) => Self::Code { code, state },
			(None, None) => Self::Denied {
				error: "invalid_request".into(),
				error_description: Some(
					"The redirect carried neither an authorization code nor an error.".into(),
				),
				state,
			},
		}
	}

	/// `state` echoed by the provider, if any.
	pub fn state(&self) -> Option<&str> {
		match self {
			Self::Code { state, .. } | Self::Denied { state, .. } => state.as_deref(),
		}
	}
}

/// Loopback listener for one authorization attempt.
#[derive(Debug)]
pub struct CallbackListener {
	listener: TcpListener,
	local_addr: SocketAddr,
	path: String,
}
impl CallbackListener {
	/// Binds `127.0.0.1:{port}` and serves `path`; port `0` picks a free port.
	pub async fn bind(port: u16, path: impl Into<String>) -> Result<Self, ConfigError> {
		let bind_err = |source| ConfigError::ListenerBind { port, source };
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(bind_err)?;
		let local_addr = listener.local_addr().map_err(bind_err)?;
		let mut path = path.into();

		if !path.starts_with('/') {
			path.insert(0, '/');
		}

		tracing::debug!(%local_addr, %path, "Callback listener bound.");

		Ok(Self { listener, local_addr, path })
	}

	/// Address the listener is bound to.
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Port the listener is bound to (useful after binding port `0`).
	pub fn port(&self) -> u16 {
		self.local_addr.port()
	}

	/// Path the listener treats as the callback.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Waits for the redirect, validates it against `expected_state`, and answers the browser.
	///
	/// Any redirect whose `state` differs from `expected_state`, error redirects included, fails
	/// with [`Error::StateMismatch`]. The listener is consumed and its socket closed in every
	/// outcome.
	pub async fn wait(self, expected_state: &str, timeout: Duration) -> Result<AuthorizationResult> {
		let deadline = Instant::now() + timeout;
		let sleep = tokio::time::sleep_until(deadline);
		let ctrl_c = tokio::signal::ctrl_c();
		let mut ctrl_c_armed = true;
		let mut pending = JoinSet::new();

		tokio::pin!(sleep, ctrl_c);

		tracing::info!(
			addr = %self.local_addr,
			path = %self.path,
			timeout_secs = timeout.as_secs(),
			"Waiting for the authorization redirect."
		);

		loop {
			tokio::select! {
				_ = &mut sleep => return Err(Error::AuthorizationTimeout { waited: timeout }),
				signal = &mut ctrl_c, if ctrl_c_armed => match signal {
					Ok(()) => return Err(Error::Cancelled),
					Err(e) => {
						ctrl_c_armed = false;

						tracing::warn!(error = %e, "Unable to listen for Ctrl-C; only the timeout applies.");
					},
				},
				accepted = self.listener.accept() => {
					let (stream, peer) = accepted.map_err(NetworkError::Io)?;

					tracing::debug!(%peer, "Accepted callback connection.");

					pending.spawn(read_head(stream));
				},
				Some(joined) = pending.join_next() => {
					let Ok((stream, head)) = joined else { continue };
					let Some(head) = head else {
						respond(stream, Status::BadRequest, &page("Bad request", "Malformed HTTP request.")).await;

						continue;
					};

					if let Some(outcome) = self.handle(stream, &head, expected_state).await {
						return outcome;
					}
				},
			}
		}
	}

	async fn handle(
		&self,
		stream: TcpStream,
		head: &RequestHead,
		expected_state: &str,
	) -> Option<Result<AuthorizationResult>> {
		let Some((path, query)) = head.callback_parts() else {
			respond(stream, Status::BadRequest, &page("Bad request", "Malformed request target."))
				.await;

			return None;
		};

		if head.method != "GET" || path != self.path {
			tracing::debug!(method = %head.method, %path, "Ignoring non-callback request.");
			respond(stream, Status::NotFound, &page("Not found", "This is not the callback path."))
				.await;

			return None;
		}

		let result = AuthorizationResult::from_query(&query);

		if result.state() != Some(expected_state) {
			tracing::warn!(
				returned = result.state().unwrap_or("<missing>"),
				"Redirect state does not match this attempt."
			);
			respond(
				stream,
				Status::BadRequest,
				&page("Authorization failed", "State mismatch; this redirect was not expected."),
			)
			.await;

			return Some(Err(Error::StateMismatch));
		}

		let outcome = match result {
			AuthorizationResult::Denied { error, error_description, .. } => {
				let detail = match &error_description {
					Some(description) => format!("{error}: {description}"),
					None => error.clone(),
				};

				respond(stream, Status::BadRequest, &page("Authorization failed", &detail)).await;

				Err(Error::AuthorizationDenied { error, description: error_description })
			},
			result => {
				respond(
					stream,
					Status::Ok,
					&page("Authorization successful", "You can close this window and return to the terminal."),
				)
				.await;

				Ok(result)
			},
		};

		Some(outcome)
	}
}

#[derive(Debug)]
struct RequestHead {
	method: String,
	target: String,
}
impl RequestHead {
	/// Splits the request target into a decoded path and the raw query string.
	fn callback_parts(&self) -> Option<(String, String)> {
		if !self.target.starts_with('/') {
			return None;
		}

		let url = Url::parse(&format!("http://localhost{}", self.target)).ok()?;

		Some((url.path().to_owned(), url.query().unwrap_or_default().to_owned()))
	}
}

async fn read_head(stream: TcpStream) -> (TcpStream, Option<RequestHead>) {
	let mut reader = BufReader::new(stream);
	let head = match tokio::time::timeout(HEAD_READ_TIMEOUT, parse_head(&mut reader)).await {
		Ok(Ok(head)) => Some(head),
		Ok(Err(e)) => {
			tracing::debug!(error = %e, "Discarding malformed callback request.");

			None
		},
		Err(_) => {
			tracing::debug!("Callback connection sent no request in time.");

			None
		},
	};

	(reader.into_inner(), head)
}

async fn parse_head(reader: &mut BufReader<TcpStream>) -> std::io::Result<RequestHead> {
	let invalid = |message: &str| IoError::new(ErrorKind::InvalidData, message.to_owned());
	let mut line = String::new();

	reader.read_line(&mut line).await?;

	let mut parts = line.split_whitespace();
	let method = parts.next().ok_or_else(|| invalid("empty request line"))?.to_owned();
	let target = parts.next().ok_or_else(|| invalid("missing request target"))?.to_owned();
	let mut consumed = line.len();

	loop {
		line.clear();

		let read = reader.read_line(&mut line).await?;

		consumed += read;

		if read == 0 || line == "\r\n" || line == "\n" {
			break;
		}
		if consumed > MAX_HEAD_BYTES {
			return Err(invalid("request head too large"));
		}
	}

	Ok(RequestHead { method, target })
}

#[derive(Clone, Copy, Debug)]
enum Status {
	Ok,
	BadRequest,
	NotFound,
}
impl Status {
	fn line(self) -> &'static str {
		match self {
			Status::Ok => "200 OK",
			Status::BadRequest => "400 Bad Request",
			Status::NotFound => "404 Not Found",
		}
	}
}

async fn respond(mut stream: TcpStream, status: Status, body: &str) {
	let response = format!(
		"HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		status.line(),
		body.len()
	);
	let written = async {
		stream.write_all(response.as_bytes()).await?;
		stream.shutdown().await
	};

	if let Err(e) = written.await {
		tracing::debug!(error = %e, "Browser went away before the callback page was sent.");
	}
}

fn page(title: &str, message: &str) -> String {
	format!(
		"<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
		 <body><h1>{title}</h1><p>{}</p></body></html>",
		escape_html(message)
	)
}

fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#x27;"),
			c => escaped.push(c),
		}
	}

	escaped
}
