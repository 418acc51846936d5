//! Internal OAuth client facade abstractions.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::BridgeConfig,
	error::{ConfigError, TransportError},
	http::{BridgeHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Outcome of a successful token-endpoint exchange.
#[derive(Clone, Debug)]
pub struct TokenExchange {
	/// Freshly issued access token.
	pub access_token: TokenSecret,
	/// Replacement refresh token, when the provider rotates it.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token.
	pub expires_in: Duration,
}
impl TokenExchange {
	/// Returns the absolute expiration instant relative to `now`.
	pub fn expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
		now + self.expires_in
	}
}

/// Maps HTTP transport failures into bridge [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a bridge error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		let _ = meta;

		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::Io(std::io::Error::other(message)).into(),
			_ => TransportError::Io(std::io::Error::other(
				"HTTP client error occurred while calling the token endpoint",
			))
			.into(),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::from(err).into()
}

/// Typed facade over the `oauth2` crate holding a configured client plus the
/// transport and error-mapping hooks.
pub(crate) struct TokenFacade<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenFacade<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_config(
		config: &BridgeConfig,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(config.authorization_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let redirect_url = RedirectUrl::new(config.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		// The provider only accepts client credentials in the request body.
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<TokenExchange> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(response)
	}

	pub(crate) async fn exchange_code(&self, code: &str) -> Result<TokenExchange> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(response)
	}
}

fn map_token_response(response: FacadeTokenResponse) -> Result<TokenExchange> {
	let expires_in = response
		.expires_in()
		.ok_or(Error::Protocol { reason: "Token response omitted expires_in".into() })?
		.as_secs();
	let expires_in = i64::try_from(expires_in)
		.map_err(|_| Error::Protocol { reason: "Token response expires_in out of range".into() })?;
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(Error::Protocol { reason: "Token response omitted access_token".into() });
	}

	Ok(TokenExchange {
		access_token: TokenSecret::new(access_token.clone()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().clone())),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) => Error::Protocol {
			reason: format!("Failed to parse the token endpoint response: {error}"),
		},
		RequestTokenError::Other(message) => Error::Protocol {
			reason: format!("Token endpoint returned an unexpected response: {message}"),
		},
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref();
	let message = if let Some(description) = response.error_description() {
		format!("Token endpoint returned an OAuth error: {description}")
	} else {
		format!("Token endpoint returned an OAuth error: {code}")
	};

	// A rejected refresh token is the one case the caller can only fix by
	// sending the user back through authorization.
	if code == "invalid_grant" {
		return Error::ReauthRequired { reason: message };
	}

	Error::Upstream { status: meta.and_then(|value| value.status).unwrap_or(400), message }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	fn config() -> BridgeConfig {
		BridgeConfig::builder(
			"client-id",
			"client-secret",
			Url::parse("https://bridge.example/callback").expect("Redirect fixture should parse."),
		)
		.build()
	}

	#[test]
	fn builds_the_facade_from_config() {
		let result = <TokenFacade<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_config(
			&config(),
			Arc::new(ReqwestHttpClient::default()),
			Arc::new(ReqwestTransportErrorMapper),
		);

		assert!(result.is_ok());
	}

	#[test]
	fn token_exchange_computes_absolute_expiry() {
		let exchange = TokenExchange {
			access_token: TokenSecret::new("access"),
			refresh_token: None,
			expires_in: Duration::seconds(3_600),
		};
		let now = OffsetDateTime::UNIX_EPOCH;

		assert_eq!(exchange.expires_at(now), now + Duration::hours(1));
	}
}
