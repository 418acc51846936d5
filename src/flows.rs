//! High-level flow orchestrators powered by the token facade.

pub mod connect;
pub mod execute;
pub mod refresh;

pub use connect::*;

// self
use crate::{
	_prelude::*,
	config::BridgeConfig,
	http::BridgeHttpClient,
	oauth::TransportErrorMapper,
	store::BridgeStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Bridge specialized for the crate's default reqwest transport stack.
pub type ReqwestBridge = Bridge<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates the credential lifecycle and worklog operations for one provider
/// configuration.
///
/// The bridge owns the HTTP client, state store, and static configuration so
/// individual flow implementations can focus on their own logic (authorization
/// sessions, refresh rotation, the refresh-and-retry orchestration). One bridge
/// serves any number of connected accounts.
#[derive(Clone)]
pub struct Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// State store that persists credentials, pending authorizations, and the action log.
	pub store: Arc<dyn BridgeStore>,
	/// Static provider configuration.
	pub config: BridgeConfig,
}
impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a bridge that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn BridgeStore>,
		config: BridgeConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self { http_client: http_client.into(), transport_mapper: mapper.into(), store, config }
	}
}
#[cfg(feature = "reqwest")]
impl Bridge<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new bridge for the provided store and configuration.
	///
	/// The bridge provisions its own reqwest-backed transport so callers do not
	/// need to pass HTTP handles explicitly.
	pub fn new(store: Arc<dyn BridgeStore>, config: BridgeConfig) -> Self {
		Self::with_http_client(
			store,
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bridge")
			.field("client_id", &self.config.client_id)
			.field("api_base", &self.config.api_base)
			.finish()
	}
}
