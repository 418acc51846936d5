//! Webhook-driven worklog bridge: delegated OAuth credential lifecycle, transparent
//! refresh-and-retry API calls, and typed webhook dispatch in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod audit;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod secret;
pub mod store;
pub mod worklog;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::BridgeConfig,
		flows::Bridge,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		store::{BridgeStore, MemoryStore},
	};

	/// Bridge type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBridge = Bridge<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a [`BridgeConfig`] whose provider endpoints all point at a mock server base URL.
	pub fn mock_config(base: &str) -> BridgeConfig {
		let parse = |suffix: &str| {
			Url::parse(&format!("{base}{suffix}"))
				.expect("Mock endpoint URL fixture should parse successfully.")
		};

		BridgeConfig::builder("client-test", "secret-test", parse("/callback"))
			.authorization_endpoint(parse("/authorize"))
			.token_endpoint(parse("/token"))
			.api_base(parse("/"))
			.build()
	}

	/// Constructs a [`Bridge`] backed by an in-memory store and the reqwest transport used across
	/// integration tests.
	pub fn build_reqwest_test_bridge(config: BridgeConfig) -> (ReqwestTestBridge, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn BridgeStore> = store_backend.clone();
		let bridge = Bridge::new(store, config);

		(bridge, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
#[cfg(test)] use worklog_bridge as _;
