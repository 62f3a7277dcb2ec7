#![cfg(feature = "test")]

// crates.io
use time::macros;
// self
use hub_authorization::{
	_preludet::*,
	auth::{DeviceId, DeviceRecord, ProviderName, TokenStatus, UserId},
	store::{CompareAndSwapOutcome, DeviceStore, MemoryStore},
};

fn device(id: &str) -> DeviceId {
	DeviceId::new(id).expect("Failed to build device identifier for memory store tests.")
}

fn user(id: &str) -> UserId {
	UserId::new(id).expect("Failed to build user identifier for memory store tests.")
}

fn build_record(device_id: &str, owner: &str, access: &str, refresh: Option<&str>) -> DeviceRecord {
	let issued = macros::datetime!(2025-11-10 12:00 UTC);
	let mut builder = DeviceRecord::builder(
		device(device_id),
		user(owner),
		ProviderName::new(TEST_PROVIDER).expect("Provider fixture should be valid."),
	)
	.access_token(access)
	.issued_at(issued)
	.expires_at(issued + Duration::hours(1));

	if let Some(value) = refresh {
		builder = builder.refresh_token(value);
	}

	builder.build().expect("Device record fixture should build successfully.")
}

#[tokio::test]
async fn save_and_fetch_round_trip() {
	let store = MemoryStore::default();
	let record = build_record("device-1", "user-1", "access-1", Some("refresh-1"));

	store.save(record.clone()).await.expect("Saving record fixture into memory store should succeed.");

	let fetched = store
		.fetch(&device("device-1"))
		.await
		.expect("Fetching device record from memory store should succeed.")
		.expect("Stored record should remain present.");

	assert_eq!(fetched.access_token.expose(), "access-1");
	assert_eq!(fetched.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-1"));
	assert_eq!(fetched.owner, user("user-1"));

	let by_token = store
		.find_by_access_token("access-1")
		.await
		.expect("Access token lookup should succeed.")
		.expect("Record should be found by its access token.");

	assert_eq!(by_token.device_id, device("device-1"));
	assert!(
		store
			.find_by_access_token("access-unknown")
			.await
			.expect("Access token lookup should succeed.")
			.is_none()
	);
}

#[tokio::test]
async fn list_by_owner_is_sorted_and_scoped() {
	let store = MemoryStore::default();

	for (id, owner) in [("device-c", "user-1"), ("device-a", "user-1"), ("device-b", "user-2")] {
		store
			.save(build_record(id, owner, &format!("access-{id}"), None))
			.await
			.expect("Saving record fixture should succeed.");
	}

	let owned = store.list_by_owner(&user("user-1")).await.expect("Listing should succeed.");
	let ids = owned.iter().map(|record| record.device_id.as_str()).collect::<Vec<_>>();

	assert_eq!(ids, vec!["device-a", "device-c"]);
	assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn cas_success_and_mismatch() {
	let store = MemoryStore::default();
	let initial = build_record("device-1", "user-1", "access-initial", Some("refresh-old"));

	store.save(initial.clone()).await.expect("Saving initial record should succeed.");

	let replacement = build_record("device-1", "user-1", "access-new", Some("refresh-new"));
	let outcome = store
		.compare_and_swap_refresh(&device("device-1"), Some("refresh-old"), replacement.clone())
		.await
		.expect("CAS operation should succeed when refresh tokens match.");

	assert_eq!(outcome, CompareAndSwapOutcome::Updated);

	let fetched = store
		.fetch(&device("device-1"))
		.await
		.expect("Fetching updated record should succeed.")
		.expect("Updated record should remain present.");

	assert_eq!(fetched.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-new"));

	let mismatch = store
		.compare_and_swap_refresh(&device("device-1"), Some("refresh-old"), replacement)
		.await
		.expect("CAS should report a refresh mismatch when tokens differ.");

	assert_eq!(mismatch, CompareAndSwapOutcome::RefreshMismatch);

	let missing = store
		.compare_and_swap_refresh(&device("device-unknown"), Some("whatever"), initial)
		.await
		.expect("CAS should report a missing record for unknown devices.");

	assert_eq!(missing, CompareAndSwapOutcome::Missing);
}

#[tokio::test]
async fn concurrent_cas_allows_single_winner() {
	let store = MemoryStore::default();

	store
		.save(build_record("device-1", "user-1", "access-base", Some("refresh-base")))
		.await
		.expect("Saving base record should succeed.");

	let tasks = ["a", "b"].map(|suffix| {
		let store = store.clone();

		tokio::spawn(async move {
			let refresh = format!("refresh-{suffix}");
			let replacement =
				build_record("device-1", "user-1", &format!("access-{suffix}"), Some(refresh.as_str()));

			store
				.compare_and_swap_refresh(&device("device-1"), Some("refresh-base"), replacement)
				.await
				.expect("CAS task should complete successfully.")
		})
	});
	let [task_a, task_b] = tasks;
	let (outcome_a, outcome_b) = tokio::join!(task_a, task_b);
	let successes = [
		outcome_a.expect("CAS task A should not panic."),
		outcome_b.expect("CAS task B should not panic."),
	]
	.iter()
	.filter(|outcome| matches!(outcome, CompareAndSwapOutcome::Updated))
	.count();

	assert_eq!(successes, 1, "only one CAS should succeed");

	let final_record = store
		.fetch(&device("device-1"))
		.await
		.expect("Fetching final record should succeed.")
		.expect("Final record should remain present.");

	assert!(matches!(
		final_record.refresh_token.as_ref().map(|secret| secret.expose()),
		Some("refresh-a") | Some("refresh-b")
	));
}

#[tokio::test]
async fn sign_out_marks_record_and_keeps_first_instant() {
	let store = MemoryStore::default();

	store
		.save(build_record("device-1", "user-1", "access", Some("refresh")))
		.await
		.expect("Saving record should succeed.");

	let first = macros::datetime!(2025-11-10 12:10 UTC);
	let signed_out = store
		.sign_out(&device("device-1"), first)
		.await
		.expect("Sign out should succeed.")
		.expect("Sign out should return the affected record.");

	assert_eq!(signed_out.signed_out_at, Some(first));
	assert_eq!(signed_out.status_at(first), TokenStatus::SignedOut);

	let again = store
		.sign_out(&device("device-1"), first + Duration::minutes(5))
		.await
		.expect("Second sign out should succeed.")
		.expect("Second sign out should return the record.");

	assert_eq!(again.signed_out_at, Some(first));
	assert!(
		store
			.sign_out(&device("device-unknown"), first)
			.await
			.expect("Sign out should not error for unknown devices.")
			.is_none()
	);
}

#[tokio::test]
async fn remove_deletes_record() {
	let store = MemoryStore::default();

	store
		.save(build_record("device-1", "user-1", "access", None))
		.await
		.expect("Saving record should succeed.");

	let removed = store.remove(&device("device-1")).await.expect("Removal should succeed.");

	assert!(removed.is_some());
	assert!(store.is_empty());
	assert!(store.remove(&device("device-1")).await.expect("Removal should succeed.").is_none());
}
