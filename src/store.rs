//! Storage contracts and built-in store implementations for bridge state.
//!
//! All state lives in a flat namespace of prefixed string keys: one credential
//! record per account (`oauth_token:<id>`), one pending-authorization record per
//! account (`oauth_state:<id>`), the single shared secret (`zapier_secret`), and
//! the bounded action log (`action_log`). Individual get/set operations are
//! atomic per key; the refresher's read-modify-write across two operations is
//! deliberately not (last write wins at this request volume).

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	audit::ActionLogEntry,
	auth::{AccountId, CredentialRecord, PendingAuthorization},
	secret::SharedSecret,
};

/// Boxed future type returned by every [`BridgeStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by bridge state stores.
pub trait BridgeStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the credential record for its account.
	fn save_credentials(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Fetches the credential record for an account, if present.
	fn fetch_credentials<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<CredentialRecord>>;

	/// Deletes the credential record for an account, returning the removed record.
	fn delete_credentials<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<CredentialRecord>>;

	/// Persists or replaces the pending-authorization record for an account.
	fn save_pending<'a>(
		&'a self,
		account: &'a AccountId,
		pending: PendingAuthorization,
	) -> StoreFuture<'a, ()>;

	/// Removes and returns the pending-authorization record for an account.
	fn take_pending<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<PendingAuthorization>>;

	/// Fetches the process-wide shared secret, if one has been provisioned.
	fn fetch_shared_secret(&self) -> StoreFuture<'_, Option<SharedSecret>>;

	/// Persists or replaces the process-wide shared secret.
	fn save_shared_secret(&self, secret: SharedSecret) -> StoreFuture<'_, ()>;

	/// Prepends an entry to the action log, trimming it to its bounded capacity.
	///
	/// Callers recording outcomes must treat failures here as non-fatal; a logging
	/// failure never alters the outcome of the action it describes.
	fn push_action(&self, entry: ActionLogEntry) -> StoreFuture<'_, ()>;

	/// Returns the retained action log entries, newest first.
	fn recent_actions(&self) -> StoreFuture<'_, Vec<ActionLogEntry>>;
}

/// Error type produced by [`BridgeStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Key-naming conventions for the flat storage namespace.
pub mod keys {
	// self
	use super::*;

	/// Key of the process-wide shared secret.
	pub const SHARED_SECRET: &str = "zapier_secret";
	/// Key of the bounded action log.
	pub const ACTION_LOG: &str = "action_log";

	/// Returns the credential-record key for an account.
	pub fn credentials(account: &AccountId) -> String {
		format!("oauth_token:{account}")
	}

	/// Returns the pending-authorization key for an account.
	pub fn pending(account: &AccountId) -> String {
		format!("oauth_state:{account}")
	}
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
	serde_json::to_value(value)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
	value: serde_json::Value,
) -> Result<T, StoreError> {
	serde_json::from_value(value)
		.map_err(|e| StoreError::Serialization { message: e.to_string() })
}
