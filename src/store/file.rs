//! File-backed [`DeviceStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, UserId},
	store::{CompareAndSwapOutcome, DeviceStore, StoreError, StoreFuture, refresh_matches},
};

/// Persists device records to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<DeviceId, DeviceRecord>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		tracing::debug!(path = %path.display(), devices = snapshot.len(), "Loaded device store snapshot.");

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<DeviceId, DeviceRecord>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<DeviceRecord> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().map(|record| (record.device_id.clone(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<DeviceId, DeviceRecord>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot = contents.values().collect::<Vec<_>>();

		snapshot.sort_by(|a, b| a.device_id.cmp(&b.device_id));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
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
}
impl DeviceStore for FileStore {
	fn save(&self, record: DeviceRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(record.device_id.clone(), record);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(device_id).cloned()) })
	}

	fn find_by_access_token<'a>(
		&'a self,
		access_token: &'a str,
	) -> StoreFuture<'a, Option<DeviceRecord>> {
		Box::pin(async move {
			Ok(self
				.inner
				.read()
				.values()
				.find(|record| record.access_token.matches(access_token))
				.cloned())
		})
	}

	fn list_by_owner<'a>(&'a self, owner: &'a UserId) -> StoreFuture<'a, Vec<DeviceRecord>> {
		Box::pin(async move {
			let mut records = self
				.inner
				.read()
				.values()
				.filter(|record| record.is_owned_by(owner))
				.cloned()
				.collect::<Vec<_>>();

			records.sort_by(|a, b| a.device_id.cmp(&b.device_id));

			Ok(records)
		})
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		device_id: &'a DeviceId,
		expected_refresh: Option<&'a str>,
		replacement: DeviceRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = match guard.get(device_id) {
				Some(existing)
					if refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
					CompareAndSwapOutcome::Updated,
				Some(_) => CompareAndSwapOutcome::RefreshMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				guard.insert(device_id.clone(), replacement);
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn sign_out<'a>(
		&'a self,
		device_id: &'a DeviceId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<DeviceRecord>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let result = match guard.get_mut(device_id) {
				Some(record) => {
					record.sign_out(instant);

					let cloned = record.clone();

					self.persist_locked(&guard)?;

					Some(cloned)
				},
				None => None,
			};

			Ok(result)
		})
	}

	fn remove<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let removed = guard.remove(device_id);

			if removed.is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(removed)
		})
	}
}
