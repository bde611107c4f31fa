//! OAuth client facade over the `oauth2` crate.
//!
//! Flows never talk to `oauth2` directly: [`BasicFacade`] owns the configured client, hands
//! it an instrumented transport handle, and translates every outcome into crate types
//! ([`TokenResponse`], [`TokenExchangeError`], [`NetworkError`]).

pub use oauth2;

// std
use std::{borrow::Cow, io::Error as IoError};
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, Client, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope,
	StandardRevocableToken, StandardTokenResponse, TokenResponse as _, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, Secret, TokenResponse},
	error::{ConfigError, NetworkError, TokenExchangeError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{GrantType, ProviderDescriptor},
};

type ProviderTokenResponse = StandardTokenResponse<ProviderTokenFields, BasicTokenType>;
type UnconfiguredClient = Client<
	BasicErrorResponse,
	ProviderTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	ProviderTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Token response fields beyond RFC 6749 §5.1 that the tester keeps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTokenFields {
	/// OpenID Connect ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Everything else the provider sent (`instance_url`, `ext_expires_in`, ...).
	#[serde(flatten)]
	pub other: BTreeMap<String, JsonValue>,
}
impl ExtraTokenFields for ProviderTokenFields {}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised while calling `endpoint`.
	fn map_transport_error(
		&self,
		endpoint: &Url,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: &Url,
		_: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => NetworkError::network(endpoint, *inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => NetworkError::Io(inner).into(),
			HttpClientError::Other(message) =>
				NetworkError::network(endpoint, IoError::other(message)).into(),
			_ => NetworkError::network(endpoint, IoError::other("unrecognized HTTP client failure"))
				.into(),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_client_credentials<'a>(&'a self, scope: &'a ScopeSet)
	-> FacadeFuture<'a, TokenResponse>;

	fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenResponse>;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	token_endpoint: Url,
	verbose: bool,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configures a `client_secret_post` client against the descriptor's token endpoint.
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &ClientId,
		client_secret: Option<&Secret>,
		verbose: bool,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let token_endpoint = descriptor.endpoints.token.clone();
		let mut oauth_client = UnconfiguredClient::new(oauth2::ClientId::new(client_id.to_string()))
			.set_token_uri(TokenUrl::from_url(token_endpoint.clone()))
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret.filter(|secret| !secret.is_empty()) {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.expose().into()));
		}

		Self {
			oauth_client,
			token_endpoint,
			verbose,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	fn finish(
		&self,
		grant: GrantType,
		slot: &ResponseMetadataSlot,
		result: Result<ProviderTokenResponse, FacadeRequestError<C::TransportError>>,
	) -> Result<TokenResponse> {
		let meta = slot.take();

		match result {
			Ok(response) => map_token_response(grant, response, meta),
			Err(err) =>
				Err(map_request_error(grant, &self.token_endpoint, meta, err, self.error_mapper.as_ref())),
		}
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials<'a>(
		&'a self,
		scope: &'a ScopeSet,
	) -> FacadeFuture<'a, TokenResponse> {
		let slot = ResponseMetadataSlot::new(self.verbose);

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(slot.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			for value in scope {
				request = request.add_scope(Scope::new(value.to_owned()));
			}

			let result = request.request_async(&instrumented).await;

			self.finish(GrantType::ClientCredentials, &slot, result)
		})
	}

	fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenResponse> {
		let slot = ResponseMetadataSlot::new(self.verbose);

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(slot.clone());
			let result = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect_uri.clone())))
				.request_async(&instrumented)
				.await;

			self.finish(GrantType::AuthorizationCode, &slot, result)
		})
	}
}

fn map_token_response(
	grant: GrantType,
	response: ProviderTokenResponse,
	meta: Option<ResponseMetadata>,
) -> Result<TokenResponse> {
	let extra = response.extra_fields();
	let mut builder = TokenResponse::builder(grant)
		.access_token(response.access_token().secret().to_owned())
		.token_type(response.token_type().as_ref())
		.extra(extra.other.clone());

	if let Some(expires_in) = response.expires_in() {
		builder = builder.expires_in(expires_in.as_secs());
	}
	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}
	if let Some(id_token) = extra.id_token.as_ref() {
		builder = builder.id_token(id_token.to_owned());
	}
	if let Some(scopes) = response.scopes() {
		builder = builder.scope(scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "));
	}

	builder.build().map_err(|err| {
		let (status, body) = meta.map(|meta| (meta.status, meta.body)).unwrap_or_default();

		TokenExchangeError::new(grant).with_status(status).with_body(body).with_source(err).into()
	})
}

fn map_request_error<E, M>(
	grant: GrantType,
	endpoint: &Url,
	meta: Option<ResponseMetadata>,
	err: FacadeRequestError<E>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => TokenExchangeError::new(grant)
			.with_status(status)
			.with_oauth_error(response.error().to_string(), response.error_description().cloned())
			.with_body(meta.and_then(|value| value.body))
			.into(),
		RequestTokenError::Request(error) => mapper.map_transport_error(endpoint, meta.as_ref(), error),
		RequestTokenError::Parse(error, body) => TokenExchangeError::new(grant)
			.with_status(status)
			.with_body(Some(String::from_utf8_lossy(&body).into_owned()))
			.with_source(error)
			.into(),
		RequestTokenError::Other(message) => TokenExchangeError::new(grant)
			.with_status(status)
			.with_body(meta.and_then(|value| value.body))
			.with_source(IoError::other(message))
			.into(),
	}
}
