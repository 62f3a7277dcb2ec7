#![cfg(feature = "test")]

// self
use hub_authorization::{
	_preludet::*,
	auth::UserId,
	service::{
		AuthorizationService, DeleteDevicesRequest, GetUserDevicesRequest, TokenVerifier,
		UserDevice, VerifyFuture,
	},
	store::{DeviceStore, MemoryStore},
};

struct StaticVerifier;
impl TokenVerifier for StaticVerifier {
	fn verify<'a>(&'a self, bearer: &'a str) -> VerifyFuture<'a> {
		Box::pin(async move {
			match bearer {
				"console-token" => Ok(UserId::new("user-2").expect("User fixture should be valid.")),
				_ => Err(Error::unauthenticated("unknown console token")),
			}
		})
	}
}

async fn seeded_service() -> (AuthorizationService, Arc<MemoryStore>) {
	let (service, store) = build_test_service("https://idp.example.com");

	for (device, owner) in [("device-b", "user-1"), ("device-a", "user-1"), ("device-c", "user-2")] {
		store
			.save(test_record(device, owner, &format!("access-{device}"), &format!("refresh-{device}")))
			.await
			.expect("Seeding device records should succeed.");
	}

	(service, store)
}

fn user_device(device: &str, user: &str) -> UserDevice {
	UserDevice { device_id: device.into(), user_id: user.into() }
}

#[tokio::test]
async fn get_user_devices_returns_only_the_callers_devices() {
	let (service, _store) = seeded_service().await;
	let response = service
		.get_user_devices("access-device-a", GetUserDevicesRequest::default())
		.await
		.expect("Listing devices should succeed.");

	assert_eq!(
		response.devices,
		vec![user_device("device-a", "user-1"), user_device("device-b", "user-1")]
	);
}

#[tokio::test]
async fn get_user_devices_applies_filters() {
	let (service, _store) = seeded_service().await;
	let by_device = service
		.get_user_devices(
			"access-device-a",
			GetUserDevicesRequest {
				device_ids_filter: vec!["device-b".into(), "device-c".into()],
				..Default::default()
			},
		)
		.await
		.expect("Listing devices should succeed.");

	assert_eq!(by_device.devices, vec![user_device("device-b", "user-1")]);

	let other_user = service
		.get_user_devices(
			"access-device-a",
			GetUserDevicesRequest { user_ids_filter: vec!["user-2".into()], ..Default::default() },
		)
		.await
		.expect("Listing devices should succeed.");

	assert!(other_user.devices.is_empty());

	let same_user = service
		.get_user_devices(
			"access-device-c",
			GetUserDevicesRequest { user_ids_filter: vec!["user-2".into()], ..Default::default() },
		)
		.await
		.expect("Listing devices should succeed.");

	assert_eq!(same_user.devices, vec![user_device("device-c", "user-2")]);
}

#[tokio::test]
async fn user_scoped_commands_require_a_known_bearer() {
	let (service, store) = seeded_service().await;
	let err = service
		.get_user_devices("access-unknown", GetUserDevicesRequest::default())
		.await
		.expect_err("Unknown bearer must be rejected.");

	assert!(matches!(err, Error::Unauthenticated { .. }));

	let err = service
		.delete_devices("", DeleteDevicesRequest::default())
		.await
		.expect_err("Missing bearer must be rejected.");

	assert!(matches!(err, Error::Unauthenticated { .. }));
	assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn delete_devices_skips_foreign_and_unknown_devices() {
	let (service, store) = seeded_service().await;
	let response = service
		.delete_devices(
			"access-device-a",
			DeleteDevicesRequest {
				device_ids: vec!["device-b".into(), "device-c".into(), "device-z".into()],
			},
		)
		.await
		.expect("Deleting devices should succeed.");

	assert_eq!(response.device_ids, vec!["device-b".to_owned()]);
	assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn delete_devices_with_empty_list_removes_everything_the_caller_owns() {
	let (service, store) = seeded_service().await;
	let response = service
		.delete_devices("access-device-a", DeleteDevicesRequest::default())
		.await
		.expect("Deleting devices should succeed.");

	assert_eq!(response.device_ids, vec!["device-a".to_owned(), "device-b".to_owned()]);
	assert_eq!(store.len(), 1);

	let remaining = service
		.get_user_devices("access-device-c", GetUserDevicesRequest::default())
		.await
		.expect("The other user's devices should remain.");

	assert_eq!(remaining.devices, vec![user_device("device-c", "user-2")]);
}

#[tokio::test]
async fn custom_verifier_resolves_the_caller() {
	let (service, _store) = seeded_service().await;
	let service = service.with_verifier(Arc::new(StaticVerifier));
	let response = service
		.get_user_devices("console-token", GetUserDevicesRequest::default())
		.await
		.expect("Custom verifier should authenticate the caller.");

	assert_eq!(response.devices, vec![user_device("device-c", "user-2")]);

	let err = service
		.get_user_devices("access-device-a", GetUserDevicesRequest::default())
		.await
		.expect_err("Device access tokens are no longer accepted.");

	assert!(matches!(err, Error::Unauthenticated { .. }));
}
