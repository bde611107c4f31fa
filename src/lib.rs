//! Interactive OAuth 2.0 flow tester: drive Authorization Code + PKCE and Client Credentials
//! grants against pluggable identity providers, probe what a provider really supports, and
//! inspect the tokens that come back.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod callback;
pub mod discovery;
pub mod error;
pub mod flows;
pub mod http;
pub mod inspect;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod report;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ClientId, ProviderId},
		flows::{FlowEngine, FlowRequest, FlowSettings},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::{GrantType, ProviderDescriptor, ProviderKind},
	};

	/// Engine type alias used by reqwest-backed integration tests.
	pub type ReqwestTestEngine = FlowEngine<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(Duration::from_secs(5))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a custom descriptor whose endpoints live under `base` (usually an `httpmock`
	/// server URL).
	pub fn mock_descriptor(base: &str) -> ProviderDescriptor {
		let id = ProviderId::new("mock-provider").expect("Failed to build mock provider id.");
		let endpoint = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Failed to parse mock endpoint URL.")
		};

		ProviderDescriptor::builder(id, ProviderKind::Custom)
			.authorization_endpoint(endpoint("/authorize"))
			.token_endpoint(endpoint("/token"))
			.metadata_endpoint(endpoint("/.well-known/openid-configuration"))
			.support_grants([GrantType::AuthorizationCode, GrantType::ClientCredentials])
			.build()
			.expect("Failed to build mock provider descriptor.")
	}

	/// Constructs a [`FlowEngine`] around `descriptor` with the insecure reqwest transport used
	/// across integration tests and a short listener timeout.
	pub fn build_reqwest_test_engine(descriptor: ProviderDescriptor) -> ReqwestTestEngine {
		let settings =
			FlowSettings { listener_timeout: Duration::from_secs(5), ..FlowSettings::default() };

		FlowEngine::with_http_client(
			descriptor,
			settings,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Flow request fixture for `client_id` with an ephemeral loopback redirect.
	pub fn test_flow_request(client_id: &str) -> FlowRequest {
		let client_id = ClientId::new(client_id).expect("Failed to build client id fixture.");
		let redirect = Url::parse("http://127.0.0.1/callback")
			.expect("Failed to parse loopback redirect fixture.");

		FlowRequest::new(client_id).with_redirect_uri(redirect).with_port(0)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "cli")] use {clap as _, tracing_subscriber as _};
#[cfg(any(test, feature = "cli"))] use color_eyre as _;
#[cfg(test)] use httpmock as _;
