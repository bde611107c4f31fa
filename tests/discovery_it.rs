#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use oauth_tester::{
	_preludet::*,
	auth::ProviderId,
	discovery::{MetadataFinding, ProbeFinding},
	flows::{FlowEngine, FlowSettings},
	oauth::ReqwestTransportErrorMapper,
	provider::{GrantType, ProviderDescriptor, ProviderKind},
	report::DiscoveryView,
};

const CLIENT_ID: &str = "discovery-client";
const METADATA_PATH: &str = "/.well-known/openid-configuration";

fn descriptor_with_device_endpoint(server: &MockServer) -> ProviderDescriptor {
	let id = ProviderId::new("mock-device").expect("Provider id fixture should be valid.");
	let url = |path: &str| Url::parse(&server.url(path)).expect("Mock URL should parse.");

	ProviderDescriptor::builder(id, ProviderKind::Custom)
		.authorization_endpoint(url("/authorize"))
		.token_endpoint(url("/token"))
		.metadata_endpoint(url(METADATA_PATH))
		.device_code_endpoint(url("/devicecode"))
		.support_grants([GrantType::AuthorizationCode, GrantType::ClientCredentials])
		.build()
		.expect("Descriptor with a device endpoint should build.")
}

#[tokio::test]
async fn metadata_and_working_client_credentials_drive_recommendations() {
	let server = MockServer::start_async().await;
	let engine = build_reqwest_test_engine(mock_descriptor(&server.base_url()));
	let metadata = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH).header("accept", "application/json");
			then.status(200).header("content-type", "application/json").body(
				r#"{
					"issuer": "https://idp.example.com",
					"authorization_endpoint": "https://idp.example.com/authorize",
					"token_endpoint": "https://idp.example.com/token",
					"grant_types_supported": ["authorization_code", "client_credentials", "refresh_token"],
					"code_challenge_methods_supported": ["S256"],
					"jwks_uri": "https://idp.example.com/keys"
				}"#,
			);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").form_urlencoded_tuple("grant_type", "client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"probe-token","token_type":"Bearer","expires_in":3599}"#);
		})
		.await;
	let request = test_flow_request(CLIENT_ID).with_client_secret("secret");
	let report = engine.discover(&request).await.expect("Discovery should run.");

	metadata.assert_async().await;
	token.assert_async().await;

	let MetadataFinding::Available { metadata } = &report.metadata else {
		panic!("Expected metadata to be available, got {:?}.", report.metadata);
	};

	assert_eq!(metadata.issuer.as_deref(), Some("https://idp.example.com"));
	assert!(metadata.other.contains_key("jwks_uri"));
	assert!(report.client_credentials.is_supported());
	assert!(report.device_code.is_none());

	let recommendations = &report.recommendations;

	assert_eq!(recommendations.recommended_flow, GrantType::ClientCredentials);
	assert_eq!(recommendations.pkce_supported, Some(true));
	assert_eq!(
		recommendations.testing_order,
		[GrantType::ClientCredentials, GrantType::AuthorizationCode]
	);
	assert!(recommendations.supported_grants.contains(&GrantType::RefreshToken));

	let text = DiscoveryView::new(&report, false).to_string();

	assert!(text.contains("Client Credentials: SUPPORTED"));
	assert!(text.contains("Suggested testing order:"));
}

#[tokio::test]
async fn missing_metadata_and_refused_grant_are_findings_not_errors() {
	let server = MockServer::start_async().await;
	let engine = build_reqwest_test_engine(mock_descriptor(&server.base_url()));
	let _metadata = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(404);
		})
		.await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				r#"{"error":"unauthorized_client","error_description":"Client credentials are disabled."}"#,
			);
		})
		.await;
	let request = test_flow_request(CLIENT_ID).with_client_secret("secret");
	let report = engine.discover(&request).await.expect("Discovery should run.");

	assert!(matches!(
		&report.metadata,
		MetadataFinding::Unavailable { reason } if reason.contains("404")
	));
	assert!(matches!(
		&report.client_credentials,
		ProbeFinding::Rejected { status: Some(400), error: Some(error), .. }
			if error == "unauthorized_client"
	));

	let recommendations = &report.recommendations;

	assert_eq!(recommendations.recommended_flow, GrantType::AuthorizationCode);
	assert!(!recommendations.supported_grants.contains(&GrantType::ClientCredentials));
	assert_eq!(recommendations.testing_order, [GrantType::AuthorizationCode]);
	assert_eq!(recommendations.pkce_supported, None);
}

#[tokio::test]
async fn non_json_metadata_is_reported_unavailable() {
	let server = MockServer::start_async().await;
	let engine = build_reqwest_test_engine(mock_descriptor(&server.base_url()));
	let _metadata = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(200).header("content-type", "text/html").body("<html>login</html>");
		})
		.await;
	let report = engine
		.discover(&test_flow_request(CLIENT_ID))
		.await
		.expect("Discovery should run without a secret.");

	assert!(matches!(report.metadata, MetadataFinding::Unavailable { .. }));
	assert!(matches!(report.client_credentials, ProbeFinding::Skipped { .. }));
	assert!(!report.client_secret_present);
}

#[tokio::test]
async fn device_code_probe_reports_user_code_details() {
	let server = MockServer::start_async().await;
	let engine = build_reqwest_test_engine(descriptor_with_device_endpoint(&server));
	let _metadata = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(404);
		})
		.await;
	let device = server
		.mock_async(|when, then| {
			when.method(POST).path("/devicecode").form_urlencoded_tuple("client_id", CLIENT_ID);
			then.status(200).header("content-type", "application/json").body(
				r#"{"device_code":"dc","user_code":"ABCD-EFGH","verification_uri":"https://idp.example.com/device","expires_in":900,"interval":5}"#,
			);
		})
		.await;
	let report = engine
		.discover(&test_flow_request(CLIENT_ID))
		.await
		.expect("Discovery should run.");

	device.assert_async().await;

	let Some(ProbeFinding::Supported { details }) = &report.device_code else {
		panic!("Expected a supported device code finding, got {:?}.", report.device_code);
	};

	assert_eq!(details.get("user_code").map(String::as_str), Some("ABCD-EFGH"));
	assert_eq!(details.get("interval").map(String::as_str), Some("5"));
	assert!(!details.contains_key("device_code"));
	assert!(report.recommendations.supported_grants.contains(&GrantType::DeviceCode));
	assert_eq!(
		report.recommendations.testing_order,
		[GrantType::AuthorizationCode, GrantType::DeviceCode]
	);
}

#[tokio::test]
async fn slow_client_credentials_trial_is_bounded_by_the_discovery_timeout() {
	let server = MockServer::start_async().await;
	let settings =
		FlowSettings { discovery_timeout: Duration::from_millis(300), ..FlowSettings::default() };
	let engine: ReqwestTestEngine = FlowEngine::with_http_client(
		mock_descriptor(&server.base_url()),
		settings,
		test_reqwest_http_client(),
		Arc::new(ReqwestTransportErrorMapper),
	);
	let _metadata = server
		.mock_async(|when, then| {
			when.method(GET).path(METADATA_PATH);
			then.status(404);
		})
		.await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.delay(Duration::from_secs(3))
				.header("content-type", "application/json")
				.body(r#"{"access_token":"late-token","token_type":"Bearer"}"#);
		})
		.await;
	let request = test_flow_request(CLIENT_ID).with_client_secret("secret");
	let started = std::time::Instant::now();
	let report = engine.discover(&request).await.expect("Discovery should run.");

	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(matches!(
		report.client_credentials,
		ProbeFinding::Failed { ref reason } if reason.contains("timed out")
	));
}
