//! In-memory store backed by a [`HashMap`].

// self
use super::*;
use crate::audit::ACTION_LOG_CAPACITY;

/// In-memory [`BridgeStore`] implementation.
///
/// Cheap to clone; clones share the same underlying map. State is lost on
/// process exit, which makes this the default choice for tests and the wrong
/// one for anything that must survive a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}
impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
		self.entries.read().get(key).cloned().map(decode).transpose()
	}

	fn set<T: Serialize>(&self, key: String, value: &T) -> Result<(), StoreError> {
		let encoded = encode(value)?;

		self.entries.write().insert(key, encoded);

		Ok(())
	}

	fn remove<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
		self.entries.write().remove(key).map(decode).transpose()
	}
}
impl BridgeStore for MemoryStore {
	fn save_credentials(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.set(keys::credentials(&record.account_id), &record) })
	}

	fn fetch_credentials<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move { self.get(&keys::credentials(account)) })
	}

	fn delete_credentials<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move { self.remove(&keys::credentials(account)) })
	}

	fn save_pending<'a>(
		&'a self,
		account: &'a AccountId,
		pending: PendingAuthorization,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.set(keys::pending(account), &pending) })
	}

	fn take_pending<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<PendingAuthorization>> {
		Box::pin(async move { self.remove(&keys::pending(account)) })
	}

	fn fetch_shared_secret(&self) -> StoreFuture<'_, Option<SharedSecret>> {
		Box::pin(async move { self.get(keys::SHARED_SECRET) })
	}

	fn save_shared_secret(&self, secret: SharedSecret) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.set(keys::SHARED_SECRET.into(), &secret) })
	}

	fn push_action(&self, entry: ActionLogEntry) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut log =
				self.get::<Vec<ActionLogEntry>>(keys::ACTION_LOG)?.unwrap_or_default();

			log.insert(0, entry);
			log.truncate(ACTION_LOG_CAPACITY);

			self.set(keys::ACTION_LOG.into(), &log)
		})
	}

	fn recent_actions(&self) -> StoreFuture<'_, Vec<ActionLogEntry>> {
		Box::pin(async move { Ok(self.get(keys::ACTION_LOG)?.unwrap_or_default()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::worklog::WorklogAction;

	fn entry(message: &str) -> ActionLogEntry {
		ActionLogEntry {
			timestamp: OffsetDateTime::UNIX_EPOCH,
			action: WorklogAction::Create,
			success: true,
			message: message.into(),
			issue_key: None,
			worklog_id: None,
			account_id: None,
		}
	}

	#[test]
	fn push_action_keeps_newest_first_and_trims_to_capacity() {
		let store = MemoryStore::new();
		let rt = tokio::runtime::Runtime::new().expect("Runtime should build.");

		rt.block_on(async {
			for i in 0..(ACTION_LOG_CAPACITY + 1) {
				store
					.push_action(entry(&format!("action {i}")))
					.await
					.expect("Push should succeed.");
			}

			let log = store.recent_actions().await.expect("Fetch should succeed.");

			assert_eq!(log.len(), ACTION_LOG_CAPACITY);
			assert_eq!(log[0].message, format!("action {ACTION_LOG_CAPACITY}"));
			// The oldest entry has been evicted.
			assert_eq!(log.last().map(|e| e.message.as_str()), Some("action 1"));
		});
	}

	#[test]
	fn take_pending_consumes_the_record() {
		let store = MemoryStore::new();
		let account = AccountId::new("U1").expect("Account fixture should be valid.");
		let rt = tokio::runtime::Runtime::new().expect("Runtime should build.");

		rt.block_on(async {
			store
				.save_pending(
					&account,
					PendingAuthorization {
						state: "wlb-test".into(),
						created_at: OffsetDateTime::UNIX_EPOCH,
					},
				)
				.await
				.expect("Save should succeed.");

			let first = store.take_pending(&account).await.expect("Take should succeed.");
			let second = store.take_pending(&account).await.expect("Take should succeed.");

			assert_eq!(first.map(|p| p.state), Some("wlb-test".into()));
			assert!(second.is_none());
		});
	}
}
