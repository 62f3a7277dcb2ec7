//! Storage contracts and built-in store implementations for device records.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, TokenSecret, UserId},
	error::ConfigError,
};

/// Boxed future returned by every [`DeviceStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by device record stores.
pub trait DeviceStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record keyed by its device id.
	fn save(&self, record: DeviceRecord) -> StoreFuture<'_, ()>;

	/// Fetches the record registered for the device, if present.
	fn fetch<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>>;

	/// Looks up the record currently holding the provided access token.
	fn find_by_access_token<'a>(
		&'a self,
		access_token: &'a str,
	) -> StoreFuture<'a, Option<DeviceRecord>>;

	/// Lists every record owned by `owner`, sorted by device id.
	fn list_by_owner<'a>(&'a self, owner: &'a UserId) -> StoreFuture<'a, Vec<DeviceRecord>>;

	/// Atomically replaces a record if its refresh token still matches `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		device_id: &'a DeviceId,
		expected_refresh: Option<&'a str>,
		replacement: DeviceRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks a record as signed out at the provided instant.
	fn sign_out<'a>(
		&'a self,
		device_id: &'a DeviceId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<DeviceRecord>>;

	/// Removes a record, returning it when it existed.
	fn remove<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but the expected refresh secret did not match.
	RefreshMismatch,
	/// No record is registered for the device.
	Missing,
}

/// Error type produced by [`DeviceStore`] implementations.
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

/// Opens the store selected by a `STORE_URI` value.
///
/// `memory://` keeps records in-process; `file:///dir` persists them to
/// `<dir>/<database>.json`.
pub fn open(uri: &str, database: &str) -> Result<Arc<dyn DeviceStore>> {
	let parsed = Url::parse(uri).map_err(|e| ConfigError::InvalidSetting {
		key: "STORE_URI",
		reason: e.to_string(),
	})?;

	match parsed.scheme() {
		"memory" => Ok(Arc::new(MemoryStore::default())),
		"file" => {
			let dir = parsed.to_file_path().map_err(|_| ConfigError::InvalidSetting {
				key: "STORE_URI",
				reason: "file URI must carry an absolute directory path".into(),
			})?;

			if database.is_empty() || database.contains(['/', '\\']) {
				return Err(ConfigError::InvalidSetting {
					key: "STORE_DATABASE",
					reason: format!("`{database}` is not a usable file name"),
				}
				.into());
			}

			let store = FileStore::open(dir.join(format!("{database}.json")))?;

			Ok(Arc::new(store))
		},
		other => Err(ConfigError::InvalidSetting {
			key: "STORE_URI",
			reason: format!("unsupported scheme `{other}`"),
		}
		.into()),
	}
}

pub(crate) fn refresh_matches(current: Option<&TokenSecret>, expected: Option<&str>) -> bool {
	match (current, expected) {
		(None, None) => true,
		(Some(cur), Some(exp)) => cur.matches(exp),
		_ => false,
	}
}
