//! Transport primitives shared by token exchanges and worklog REST calls.
//!
//! The module exposes [`BridgeHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can integrate custom HTTP
//! clients without losing the bridge's instrumentation hooks. Implementations
//! call [`ResponseMetadataSlot::take`] before dispatching a token request and
//! [`ResponseMetadataSlot::store`] once an HTTP status is known, enabling
//! request-error mapping to classify failures with consistent metadata.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Abstraction over HTTP transports capable of executing both OAuth token
/// exchanges and bearer-authenticated REST calls.
///
/// The trait is the bridge's only dependency on an HTTP stack. Callers provide
/// an implementation (typically behind `Arc<T>` where `T: BridgeHttpClient`)
/// and the bridge requests short-lived [`AsyncHttpClient`] handles that each
/// carry a clone of a [`ResponseMetadataSlot`]. Handles must own whatever state
/// they need so their request futures stay `Send` for the lifetime of the
/// in-flight operation.
pub trait BridgeHttpClient
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
	/// Implementations must call [`ResponseMetadataSlot::take`] before submitting
	/// the request so stale information never leaks across retries, and
	/// [`ResponseMetadataSlot::store`] once a status is available.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;

	/// Executes a plain REST request, returning the raw status and body.
	///
	/// Non-2xx statuses are not transport errors; they come back as a normal
	/// [`RestResponse`] so callers can apply their own status policies.
	fn execute(&self, request: RestRequest) -> RestFuture<'_>;
}

/// Captures metadata from the most recent token-endpoint response for
/// downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and
/// error layers.
///
/// The bridge creates a fresh slot for each token request and reads the
/// captured metadata immediately after `oauth2` resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// HTTP methods used by the worklog REST surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestMethod {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `DELETE`.
	Delete,
}
impl RestMethod {
	/// Returns the canonical method name.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}
}

/// One REST request against the provider's API gateway.
#[derive(Clone, Debug)]
pub struct RestRequest {
	/// HTTP method.
	pub method: RestMethod,
	/// Fully resolved request URL.
	pub url: Url,
	/// Bearer token attached as `Authorization`, when the endpoint requires one.
	pub bearer: Option<TokenSecret>,
	/// JSON request body, when the method carries one.
	pub body: Option<serde_json::Value>,
}
impl RestRequest {
	/// Builds a request with no bearer token and no body.
	pub fn new(method: RestMethod, url: Url) -> Self {
		Self { method, url, bearer: None, body: None }
	}

	/// Attaches a bearer token.
	pub fn bearer(mut self, token: TokenSecret) -> Self {
		self.bearer = Some(token);

		self
	}

	/// Attaches a JSON body.
	pub fn json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}
}

/// Raw outcome of a [`RestRequest`].
#[derive(Clone, Debug)]
pub struct RestResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body as text; may be empty.
	pub body: String,
}
impl RestResponse {
	/// Returns whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns whether the status indicates a failed or expired credential.
	///
	/// Both 401 and 403 qualify; the provider is known to answer expired tokens
	/// with either status depending on the gateway layer involved.
	pub fn is_auth_failure(&self) -> bool {
		self.status == 401 || self.status == 403
	}
}

/// Boxed future type returned by [`BridgeHttpClient::execute`].
pub type RestFuture<'a> = Pin<Box<dyn Future<Output = Result<RestResponse, TransportError>> + 'a + Send>>;

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Token requests should not follow redirects, matching OAuth 2.0
/// guidance that token endpoints return results directly instead of delegating
/// to another URI. Configure any custom [`ReqwestClient`] accordingly, because
/// the bridge passes this client into the `oauth2` crate when it builds the
/// token facade.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
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
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

#[cfg(feature = "reqwest")]
/// Public handle returned by [`ReqwestHttpClient`] that satisfies [`BridgeHttpClient`].
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
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
#[cfg(feature = "reqwest")]
impl BridgeHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}

	fn execute(&self, request: RestRequest) -> RestFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				RestMethod::Get => reqwest::Method::GET,
				RestMethod::Post => reqwest::Method::POST,
				RestMethod::Put => reqwest::Method::PUT,
				RestMethod::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, request.url);

			if let Some(bearer) = &request.bearer {
				builder = builder.bearer_auth(bearer.expose());
			}
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.text().await.map_err(TransportError::from)?;

			Ok(RestResponse { status, body })
		})
	}
}
