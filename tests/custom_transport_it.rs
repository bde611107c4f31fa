// std
use std::{
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use color_eyre::{Result as EyreResult, eyre::eyre};
use parking_lot::Mutex;
use url::Url;
// self
use oauth_tester::{
	auth::{ClientId, ProviderId},
	error::{Error, NetworkError},
	flows::{FlowEngine, FlowRequest, FlowSettings},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::Response},
	},
	provider::{GrantType, ProviderDescriptor, ProviderKind},
};

#[derive(Debug)]
struct Unavailable;
impl Display for Unavailable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Upstream unavailable.")
	}
}
impl std::error::Error for Unavailable {}

/// Answers every request with a canned outcome and keeps the bodies it was sent.
#[derive(Clone)]
struct ScriptedHttpClient {
	outcome: Result<&'static str, u16>,
	sent: Arc<Mutex<Vec<String>>>,
}
impl ScriptedHttpClient {
	fn answering(body: &'static str) -> Self {
		Self { outcome: Ok(body), sent: Default::default() }
	}

	fn failing_with(status: u16) -> Self {
		Self { outcome: Err(status), sent: Default::default() }
	}
}
impl TokenHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = Unavailable;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { client: self.clone(), slot }
	}
}

struct ScriptedHandle {
	client: ScriptedHttpClient,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for ScriptedHandle {
	type Error = HttpClientError<Unavailable>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			assert!(self.slot.take().is_none(), "Slot should be clear before dispatch.");

			self.client.sent.lock().push(String::from_utf8_lossy(request.body()).into_owned());

			match self.client.outcome {
				Ok(body) => {
					self.slot.store(ResponseMetadata { status: Some(200), body: Some(body.into()) });

					Response::builder()
						.status(200)
						.header("content-type", "application/json")
						.body(body.as_bytes().to_vec())
						.map_err(HttpClientError::Http)
				},
				Err(status) => {
					self.slot.store(ResponseMetadata { status: Some(status), body: None });

					Err(HttpClientError::Reqwest(Box::new(Unavailable)))
				},
			}
		})
	}
}

#[derive(Default)]
struct RecordingMapper {
	seen: Mutex<Vec<Option<u16>>>,
}
impl TransportErrorMapper<Unavailable> for RecordingMapper {
	fn map_transport_error(
		&self,
		endpoint: &Url,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<Unavailable>,
	) -> Error {
		self.seen.lock().push(metadata.and_then(|meta| meta.status));

		match error {
			HttpClientError::Reqwest(inner) => NetworkError::network(endpoint, *inner).into(),
			other => NetworkError::network(endpoint, std::io::Error::other(other.to_string())).into(),
		}
	}
}

fn descriptor() -> ProviderDescriptor {
	let id = ProviderId::new("scripted").expect("Provider id fixture should be valid.");

	ProviderDescriptor::builder(id, ProviderKind::Custom)
		.authorization_endpoint(
			Url::parse("https://idp.example.com/authorize").expect("Authorize URL should parse."),
		)
		.token_endpoint(Url::parse("https://idp.example.com/token").expect("Token URL should parse."))
		.support_grant(GrantType::ClientCredentials)
		.build()
		.expect("Scripted descriptor should build.")
}

fn request() -> FlowRequest {
	FlowRequest::new(ClientId::new("scripted-client").expect("Client id fixture should be valid."))
		.with_client_secret("scripted-secret")
		.with_scope("jobs.run")
}

type ScriptedEngine = FlowEngine<ScriptedHttpClient, RecordingMapper>;

#[tokio::test]
async fn engine_runs_over_any_token_http_client() -> EyreResult<()> {
	let client = ScriptedHttpClient::answering(
		r#"{"access_token":"scripted-token","token_type":"Bearer","expires_in":60}"#,
	);
	let engine = ScriptedEngine::with_http_client(
		descriptor(),
		FlowSettings::default(),
		client.clone(),
		Arc::new(RecordingMapper::default()),
	);
	let response = engine.client_credentials(&request()).await?;
	let sent = client.sent.lock().clone();
	let body = sent.first().ok_or_else(|| eyre!("no request reached the scripted transport"))?;

	assert_eq!(response.access_token.expose(), "scripted-token");
	assert_eq!(sent.len(), 1);
	assert!(body.contains("grant_type=client_credentials"));
	assert!(body.contains("client_secret=scripted-secret"));
	assert!(body.contains("scope=jobs.run"));

	Ok(())
}

#[tokio::test]
async fn transport_failures_reach_the_mapper_with_metadata() -> EyreResult<()> {
	let mapper = Arc::new(RecordingMapper::default());
	let engine = ScriptedEngine::with_http_client(
		descriptor(),
		FlowSettings::default(),
		ScriptedHttpClient::failing_with(503),
		Arc::clone(&mapper),
	);
	let Err(err) = engine.client_credentials(&request()).await else {
		return Err(eyre!("a failing transport should fail the flow"));
	};

	assert!(matches!(err, Error::Network(NetworkError::Network { .. })));
	assert_eq!(*mapper.seen.lock(), [Some(503)]);

	Ok(())
}
