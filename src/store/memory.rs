//! Thread-safe in-memory [`DeviceStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, UserId},
	store::{CompareAndSwapOutcome, DeviceStore, StoreError, StoreFuture, refresh_matches},
};

type StoreMap = Arc<RwLock<HashMap<DeviceId, DeviceRecord>>>;

/// Thread-safe storage backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no device is registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, record: DeviceRecord) -> Result<(), StoreError> {
		map.write().insert(record.device_id.clone(), record);

		Ok(())
	}

	fn find_by_access_token_now(map: StoreMap, access_token: &str) -> Option<DeviceRecord> {
		map.read().values().find(|record| record.access_token.matches(access_token)).cloned()
	}

	fn list_by_owner_now(map: StoreMap, owner: &UserId) -> Vec<DeviceRecord> {
		let mut records = map
			.read()
			.values()
			.filter(|record| record.is_owned_by(owner))
			.cloned()
			.collect::<Vec<_>>();

		records.sort_by(|a, b| a.device_id.cmp(&b.device_id));

		records
	}

	fn cas_now(
		map: StoreMap,
		device_id: &DeviceId,
		expected_refresh: Option<&str>,
		replacement: DeviceRecord,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(device_id) {
			Some(existing) if refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(device_id.clone(), replacement);
		}

		outcome
	}

	fn sign_out_now(
		map: StoreMap,
		device_id: &DeviceId,
		instant: OffsetDateTime,
	) -> Option<DeviceRecord> {
		let mut guard = map.write();

		match guard.get_mut(device_id) {
			Some(record) => {
				record.sign_out(instant);

				Some(record.clone())
			},
			None => None,
		}
	}
}
impl DeviceStore for MemoryStore {
	fn save(&self, record: DeviceRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}

	fn fetch<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(device_id).cloned()) })
	}

	fn find_by_access_token<'a>(
		&'a self,
		access_token: &'a str,
	) -> StoreFuture<'a, Option<DeviceRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::find_by_access_token_now(map, access_token)) })
	}

	fn list_by_owner<'a>(&'a self, owner: &'a UserId) -> StoreFuture<'a, Vec<DeviceRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::list_by_owner_now(map, owner)) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		device_id: &'a DeviceId,
		expected_refresh: Option<&'a str>,
		replacement: DeviceRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cas_now(map, device_id, expected_refresh, replacement)) })
	}

	fn sign_out<'a>(
		&'a self,
		device_id: &'a DeviceId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<DeviceRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::sign_out_now(map, device_id, instant)) })
	}

	fn remove<'a>(&'a self, device_id: &'a DeviceId) -> StoreFuture<'a, Option<DeviceRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(device_id)) })
	}
}
