//! Simple file-backed [`BridgeStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use super::*;
use crate::audit::ACTION_LOG_CAPACITY;

/// Persists the bridge's flat key namespace to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<String, serde_json::Value>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(
		&self,
		contents: &HashMap<String, serde_json::Value>,
	) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
		self.inner.read().get(key).cloned().map(decode).transpose()
	}

	fn set<T: Serialize>(&self, key: String, value: &T) -> Result<(), StoreError> {
		let encoded = encode(value)?;
		let mut guard = self.inner.write();

		guard.insert(key, encoded);
		self.persist_locked(&guard)
	}

	fn remove<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
		let mut guard = self.inner.write();
		let removed = guard.remove(key);

		if removed.is_some() {
			self.persist_locked(&guard)?;
		}

		removed.map(decode).transpose()
	}
}
impl BridgeStore for FileStore {
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
