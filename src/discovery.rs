//! Capability discovery: what a provider advertises versus what it actually accepts.
//!
//! [`DiscoveryProbe::run`] fetches the OpenID Connect metadata document, test-drives Client
//! Credentials with the supplied secret, pokes the device authorization endpoint when the
//! provider has one, and folds everything into a [`DiscoveryReport`]. Sub-probe failures are
//! findings, never errors.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::TokenResponse,
	error::{ConfigError, NetworkError},
	flows::{FlowEngine, FlowRequest},
	http::{ResponseMetadataSlot, TokenHttpClient},
	inspect,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::GrantType,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Subset of an OpenID Connect discovery document (RFC 8414 / OIDC Discovery 1.0).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// `issuer`.
	#[serde(default)]
	pub issuer: Option<String>,
	/// `authorization_endpoint`.
	#[serde(default)]
	pub authorization_endpoint: Option<String>,
	/// `token_endpoint`.
	#[serde(default)]
	pub token_endpoint: Option<String>,
	/// `device_authorization_endpoint`.
	#[serde(default)]
	pub device_authorization_endpoint: Option<String>,
	/// `grant_types_supported`.
	#[serde(default)]
	pub grant_types_supported: Vec<String>,
	/// `response_types_supported`.
	#[serde(default)]
	pub response_types_supported: Vec<String>,
	/// `scopes_supported`.
	#[serde(default)]
	pub scopes_supported: Vec<String>,
	/// `code_challenge_methods_supported`.
	#[serde(default)]
	pub code_challenge_methods_supported: Vec<String>,
	/// `token_endpoint_auth_methods_supported`.
	#[serde(default)]
	pub token_endpoint_auth_methods_supported: Vec<String>,
	/// Every other field, kept for verbose reports.
	#[serde(flatten)]
	pub other: BTreeMap<String, JsonValue>,
}
impl ProviderMetadata {
	/// Advertised grants the tester knows how to name; unknown identifiers are dropped.
	pub fn known_grants(&self) -> Vec<GrantType> {
		self.grant_types_supported.iter().filter_map(|grant| grant.parse().ok()).collect()
	}
}

/// Outcome of the metadata fetch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetadataFinding {
	/// Document fetched and parsed.
	Available {
		/// Parsed document.
		metadata: Box<ProviderMetadata>,
	},
	/// Endpoint exists but could not be used (transport failure, non-2xx, or not JSON).
	Unavailable {
		/// Human-readable cause.
		reason: String,
	},
	/// Provider has no metadata endpoint.
	NotPublished,
}

/// Outcome of a live grant probe.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeFinding {
	/// Provider accepted the request.
	Supported {
		/// Non-secret facts about the answer (token type, lifetime, granted scope, roles).
		details: BTreeMap<String, String>,
	},
	/// Provider answered with an OAuth error.
	Rejected {
		/// HTTP status.
		status: Option<u16>,
		/// OAuth `error` code.
		error: Option<String>,
		/// OAuth `error_description`.
		description: Option<String>,
	},
	/// Request never got an answer (DNS, TLS, timeout, malformed response).
	Failed {
		/// Human-readable cause.
		reason: String,
	},
	/// Probe was not attempted.
	Skipped {
		/// Why it was skipped.
		reason: String,
	},
}
impl ProbeFinding {
	/// Returns true for [`ProbeFinding::Supported`].
	pub fn is_supported(&self) -> bool {
		matches!(self, ProbeFinding::Supported { .. })
	}

	/// Returns true when the provider explicitly refused the grant for this client.
	pub fn is_grant_refusal(&self) -> bool {
		matches!(
			self,
			ProbeFinding::Rejected { error: Some(error), .. }
				if error == "unsupported_grant_type" || error == "unauthorized_client"
		)
	}

	fn skipped(reason: impl Into<String>) -> Self {
		ProbeFinding::Skipped { reason: reason.into() }
	}

	fn failed(reason: impl Display) -> Self {
		ProbeFinding::Failed { reason: reason.to_string() }
	}
}

/// Aggregated advice derived from every finding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendations {
	/// Grants believed to work, advertised or confirmed.
	pub supported_grants: Vec<GrantType>,
	/// `Some(true)` when metadata lists S256, `Some(false)` when it lists only other methods,
	/// `None` when the provider does not say.
	pub pkce_supported: Option<bool>,
	/// Flow to start with.
	pub recommended_flow: GrantType,
	/// Suggested order for trying the flows by hand.
	pub testing_order: Vec<GrantType>,
	/// Free-form guidance.
	pub notes: Vec<String>,
}

/// Everything discovery learned about a provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscoveryReport {
	/// Provider display name.
	pub provider: String,
	/// Client identifier used for the probes.
	pub client_id: String,
	/// Whether a client secret was supplied.
	pub client_secret_present: bool,
	/// Metadata endpoint that was queried, if any.
	pub metadata_endpoint: Option<Url>,
	/// Metadata fetch outcome.
	pub metadata: MetadataFinding,
	/// Client Credentials trial outcome.
	pub client_credentials: ProbeFinding,
	/// Device authorization probe outcome; `None` when the provider has no such endpoint.
	pub device_code: Option<ProbeFinding>,
	/// Aggregated advice.
	pub recommendations: Recommendations,
}

/// Runs the discovery sequence on top of a [`FlowEngine`].
#[derive(Debug)]
pub struct DiscoveryProbe<'e, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	engine: &'e FlowEngine<C, M>,
}
impl<'e, C, M> DiscoveryProbe<'e, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Borrows `engine` for one discovery run.
	pub fn new(engine: &'e FlowEngine<C, M>) -> Self {
		Self { engine }
	}

	/// Runs every sub-probe and aggregates the findings.
	///
	/// Only fails when another attempt already holds the engine.
	pub async fn run(&self, request: &FlowRequest) -> Result<DiscoveryReport> {
		const KIND: FlowKind = FlowKind::Discovery;

		let _attempt = self.engine.claim()?;
		let span = FlowSpan::new(KIND, "discover");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let report = span.in_span(self.collect(request)).await;

		obs::record_flow_outcome(KIND, FlowOutcome::Success);

		Ok(report)
	}

	async fn collect(&self, request: &FlowRequest) -> DiscoveryReport {
		let descriptor = &self.engine.descriptor;
		let metadata = self.fetch_metadata(request.verbose).await;
		let client_credentials = self.probe_client_credentials(request).await;
		let device_code = self.probe_device_code(request).await;
		let recommendations =
			recommend(self.engine, request, &metadata, &client_credentials, device_code.as_ref());

		DiscoveryReport {
			provider: descriptor.display_name().to_owned(),
			client_id: request.client_id.to_string(),
			client_secret_present: request.secret().is_some(),
			metadata_endpoint: descriptor.endpoints.metadata.clone(),
			metadata,
			client_credentials,
			device_code,
			recommendations,
		}
	}

	async fn fetch_metadata(&self, verbose: bool) -> MetadataFinding {
		let Some(endpoint) = self.engine.descriptor.endpoints.metadata.as_ref() else {
			return MetadataFinding::NotPublished;
		};

		tracing::info!(%endpoint, "Fetching provider metadata.");

		let request = match Request::builder()
			.method(Method::GET)
			.uri(endpoint.as_str())
			.header(ACCEPT, JSON_CONTENT_TYPE)
			.body(Vec::new())
		{
			Ok(request) => request,
			Err(e) => return MetadataFinding::Unavailable { reason: ConfigError::from(e).to_string() },
		};
		let response = match self.send(endpoint, request, verbose).await {
			Ok(response) => response,
			Err(e) => {
				tracing::warn!(error = %e, "Provider metadata is unavailable.");

				return MetadataFinding::Unavailable { reason: e.to_string() };
			},
		};

		if !response.status().is_success() {
			return MetadataFinding::Unavailable {
				reason: format!("metadata endpoint answered HTTP {}", response.status().as_u16()),
			};
		}

		let deserializer = &mut serde_json::Deserializer::from_slice(response.body());

		match serde_path_to_error::deserialize::<_, ProviderMetadata>(deserializer) {
			Ok(metadata) => MetadataFinding::Available { metadata: Box::new(metadata) },
			Err(e) => MetadataFinding::Unavailable {
				reason: format!("metadata is not a valid discovery document (at `{}`: {})", e.path(), e.inner()),
			},
		}
	}

	async fn probe_client_credentials(&self, request: &FlowRequest) -> ProbeFinding {
		if request.secret().is_none() {
			return ProbeFinding::skipped("no client secret provided");
		}
		if !self.engine.descriptor.supports(GrantType::ClientCredentials) {
			return ProbeFinding::skipped("the provider descriptor does not enable Client Credentials");
		}

		tracing::info!("Testing the Client Credentials grant.");

		let after = self.engine.settings.discovery_timeout;
		let trial = self.engine.client_credentials_unguarded(request);

		match tokio::time::timeout(after, trial).await {
			Ok(Ok(token)) => ProbeFinding::Supported { details: token_details(&token) },
			Ok(Err(Error::TokenExchange(e))) => ProbeFinding::Rejected {
				status: e.status,
				error: e.error,
				description: e.error_description,
			},
			Ok(Err(e)) => ProbeFinding::failed(e),
			Err(_) => ProbeFinding::failed(NetworkError::Timeout {
				endpoint: self.engine.descriptor.endpoints.token.to_string(),
				after,
			}),
		}
	}

	async fn probe_device_code(&self, request: &FlowRequest) -> Option<ProbeFinding> {
		let descriptor = &self.engine.descriptor;
		let endpoint = descriptor.endpoints.device_code.as_ref()?;

		tracing::info!(%endpoint, "Testing the Device Code grant.");

		let mut form = url::form_urlencoded::Serializer::new(String::new());

		form.append_pair("client_id", request.client_id.as_ref());

		if let Some(scope) = descriptor.kind.device_code_probe_scope() {
			form.append_pair("scope", scope);
		}

		let request_http = match Request::builder()
			.method(Method::POST)
			.uri(endpoint.as_str())
			.header(ACCEPT, JSON_CONTENT_TYPE)
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.body(form.finish().into_bytes())
		{
			Ok(request) => request,
			Err(e) => return Some(ProbeFinding::failed(ConfigError::from(e))),
		};
		let response = match self.send(endpoint, request_http, request.verbose).await {
			Ok(response) => response,
			Err(e) => return Some(ProbeFinding::failed(e)),
		};
		let body = serde_json::from_slice::<JsonMap<String, JsonValue>>(response.body()).ok();
		let field = |name: &str| {
			body.as_ref().and_then(|map| map.get(name)).and_then(|value| match value {
				JsonValue::String(text) => Some(text.clone()),
				JsonValue::Number(number) => Some(number.to_string()),
				_ => None,
			})
		};

		if response.status().is_success() {
			let details = ["user_code", "verification_uri", "expires_in", "interval"]
				.into_iter()
				.filter_map(|name| field(name).map(|value| (name.to_owned(), value)))
				.collect();

			Some(ProbeFinding::Supported { details })
		} else {
			Some(ProbeFinding::Rejected {
				status: Some(response.status().as_u16()),
				error: field("error"),
				description: field("error_description"),
			})
		}
	}

	/// Sends a single request through the engine's transport, bounded by the discovery timeout.
	async fn send(&self, endpoint: &Url, request: HttpRequest, verbose: bool) -> Result<HttpResponse> {
		let slot = ResponseMetadataSlot::new(verbose);
		let handle = self.engine.http_client.with_metadata(slot.clone());
		let after = self.engine.settings.discovery_timeout;

		match tokio::time::timeout(after, handle.call(request)).await {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(e)) => Err(self.engine.transport_mapper.map_transport_error(
				endpoint,
				slot.take().as_ref(),
				e,
			)),
			Err(_) => Err(NetworkError::Timeout { endpoint: endpoint.to_string(), after }.into()),
		}
	}
}

impl<C, M> FlowEngine<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Shorthand for [`DiscoveryProbe::run`].
	pub async fn discover(&self, request: &FlowRequest) -> Result<DiscoveryReport> {
		DiscoveryProbe::new(self).run(request).await
	}
}

fn token_details(token: &TokenResponse) -> BTreeMap<String, String> {
	let mut details = BTreeMap::new();

	details.insert("token_type".into(), token.token_type.clone());

	if let Some(expires_in) = token.expires_in {
		details.insert("expires_in".into(), expires_in.to_string());
	}
	if let Some(scope) = token.scope.as_ref() {
		details.insert("scope".into(), scope.clone());
	}
	if let Some(instance_url) = token.extra_field("instance_url").and_then(JsonValue::as_str) {
		details.insert("instance_url".into(), instance_url.to_owned());
	}
	if let Some(claims) = inspect::decode(token.access_token.expose()).claims() {
		if !claims.roles.is_empty() {
			details.insert("roles".into(), claims.roles.join(" "));
		}
		if !claims.scopes.is_empty() {
			details.entry("scope".into()).or_insert_with(|| claims.scopes.join(" "));
		}
	}

	details
}

fn recommend<C, M>(
	engine: &FlowEngine<C, M>,
	request: &FlowRequest,
	metadata: &MetadataFinding,
	client_credentials: &ProbeFinding,
	device_code: Option<&ProbeFinding>,
) -> Recommendations
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let advertised = match metadata {
		MetadataFinding::Available { metadata } if !metadata.grant_types_supported.is_empty() =>
			metadata.known_grants(),
		_ => GrantType::ALL.into_iter().filter(|grant| engine.descriptor.supports(*grant)).collect(),
	};
	let device_refused = device_code.is_some_and(ProbeFinding::is_grant_refusal);
	let supported_grants = GrantType::ALL
		.into_iter()
		.filter(|grant| match grant {
			GrantType::ClientCredentials =>
				client_credentials.is_supported()
					|| (advertised.contains(grant) && !client_credentials.is_grant_refusal()),
			GrantType::DeviceCode =>
				device_code.is_some_and(ProbeFinding::is_supported)
					|| (advertised.contains(grant) && !device_refused),
			grant => advertised.contains(grant),
		})
		.collect::<Vec<_>>();
	let pkce_supported = match metadata {
		MetadataFinding::Available { metadata }
			if !metadata.code_challenge_methods_supported.is_empty() =>
			Some(metadata.code_challenge_methods_supported.iter().any(|method| method == "S256")),
		_ => None,
	};
	let secret_present = request.secret().is_some();
	let recommended_flow = if client_credentials.is_supported() {
		GrantType::ClientCredentials
	} else {
		GrantType::AuthorizationCode
	};
	let mut testing_order = Vec::new();
	let mut notes = Vec::new();

	if secret_present && supported_grants.contains(&GrantType::ClientCredentials) {
		testing_order.push(GrantType::ClientCredentials);
	}

	testing_order.push(GrantType::AuthorizationCode);

	if supported_grants.contains(&GrantType::DeviceCode) {
		testing_order.push(GrantType::DeviceCode);
	}

	if secret_present {
		notes.push("A client secret is available: Client Credentials (app-only) and Authorization Code (user) flows can both be used.".into());
	} else {
		notes.push("No client secret provided: use Authorization Code with PKCE (public client); Client Credentials cannot be used.".into());
	}
	if client_credentials.is_grant_refusal() {
		notes.push("The provider refused Client Credentials for this client; check the app registration's grant settings.".into());
	}
	if pkce_supported == Some(false) {
		notes.push("Metadata does not list S256 among the PKCE methods; the Authorization Code flow may fail.".into());
	}

	notes.push(
		"Authorization Code requires user interaction and cannot be probed; run the auth-code command to test it."
			.into(),
	);

	Recommendations { supported_grants, pkce_supported, recommended_flow, testing_order, notes }
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn engine() -> ReqwestTestEngine {
		build_reqwest_test_engine(mock_descriptor("http://127.0.0.1:9"))
	}

	fn supported() -> ProbeFinding {
		ProbeFinding::Supported { details: BTreeMap::new() }
	}

	fn rejected(error: &str) -> ProbeFinding {
		ProbeFinding::Rejected { status: Some(400), error: Some(error.into()), description: None }
	}

	fn metadata(grants: &[&str], pkce: &[&str]) -> MetadataFinding {
		MetadataFinding::Available {
			metadata: Box::new(ProviderMetadata {
				grant_types_supported: grants.iter().map(|grant| (*grant).to_owned()).collect(),
				code_challenge_methods_supported: pkce.iter().map(|method| (*method).to_owned()).collect(),
				..Default::default()
			}),
		}
	}

	#[test]
	fn findings_serialize_with_an_outcome_tag() {
		let finding = ProbeFinding::Rejected {
			status: Some(401),
			error: Some("invalid_client".into()),
			description: None,
		};
		let value = serde_json::to_value(&finding).expect("Finding should serialize.");

		assert_eq!(value["outcome"], "rejected");
		assert_eq!(value["status"], 401);
		assert_eq!(
			serde_json::to_value(MetadataFinding::NotPublished)
				.expect("Metadata finding should serialize.")["outcome"],
			"not_published"
		);
	}

	#[test]
	fn metadata_documents_keep_unknown_fields() {
		let metadata: ProviderMetadata = serde_json::from_str(
			r#"{
				"issuer": "https://idp.example.com",
				"grant_types_supported": ["authorization_code", "implicit", "client_credentials"],
				"claims_supported": ["sub"]
			}"#,
		)
		.expect("Metadata fixture should deserialize.");

		assert_eq!(
			metadata.known_grants(),
			[GrantType::AuthorizationCode, GrantType::ClientCredentials]
		);
		assert!(metadata.other.contains_key("claims_supported"));
	}

	#[test]
	fn confirmed_client_credentials_lead_the_testing_order() {
		let engine = engine();
		let request = test_flow_request("app").with_client_secret("secret");
		let recommendations = recommend(
			&engine,
			&request,
			&metadata(&["authorization_code"], &["S256"]),
			&supported(),
			None,
		);

		assert_eq!(
			recommendations.supported_grants,
			[GrantType::AuthorizationCode, GrantType::ClientCredentials]
		);
		assert_eq!(recommendations.pkce_supported, Some(true));
		assert_eq!(recommendations.recommended_flow, GrantType::ClientCredentials);
		assert_eq!(
			recommendations.testing_order,
			[GrantType::ClientCredentials, GrantType::AuthorizationCode]
		);
	}

	#[test]
	fn refusals_override_advertised_grants() {
		let engine = engine();
		let request = test_flow_request("app").with_client_secret("secret");
		let recommendations = recommend(
			&engine,
			&request,
			&MetadataFinding::Unavailable { reason: "HTTP 404".into() },
			&rejected("unauthorized_client"),
			Some(&rejected("unsupported_grant_type")),
		);

		assert_eq!(recommendations.supported_grants, [GrantType::AuthorizationCode]);
		assert_eq!(recommendations.pkce_supported, None);
		assert_eq!(recommendations.recommended_flow, GrantType::AuthorizationCode);
		assert_eq!(recommendations.testing_order, [GrantType::AuthorizationCode]);
	}

	#[test]
	fn public_clients_are_pointed_at_pkce() {
		let engine = engine();
		let recommendations = recommend(
			&engine,
			&test_flow_request("app"),
			&metadata(&[], &["plain"]),
			&ProbeFinding::skipped("no client secret provided"),
			None,
		);

		assert_eq!(recommendations.pkce_supported, Some(false));
		assert!(recommendations.notes.iter().any(|note| note.contains("No client secret")));
		assert_eq!(recommendations.testing_order, [GrantType::AuthorizationCode]);
	}
}
