//! User-scoped device queries and bulk deletion.

// self
use crate::{
	_prelude::*,
	auth::DeviceId,
	obs::CommandKind,
	service::{AuthorizationService, observe},
};

/// Device listing request; empty filters match everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GetUserDevicesRequest {
	/// Only answer when the caller is one of these users.
	pub user_ids_filter: Vec<String>,
	/// Only return these devices.
	pub device_ids_filter: Vec<String>,
}

/// One device registered to a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserDevice {
	/// Registered device.
	pub device_id: String,
	/// Owner of the device.
	pub user_id: String,
}

/// Devices of the calling user, sorted by device id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetUserDevicesResponse {
	/// Matching devices.
	pub devices: Vec<UserDevice>,
}

/// Bulk deletion request; an empty list deletes every device the caller owns.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDevicesRequest {
	/// Devices to delete.
	pub device_ids: Vec<String>,
}

/// Devices that were actually deleted, sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteDevicesResponse {
	/// Deleted devices.
	pub device_ids: Vec<String>,
}

impl AuthorizationService {
	/// Lists the devices registered to the user behind `bearer`.
	pub async fn get_user_devices(
		&self,
		bearer: &str,
		request: GetUserDevicesRequest,
	) -> Result<GetUserDevicesResponse> {
		observe(CommandKind::GetUserDevices, "get_user_devices", async move {
			let user = self.verifier.verify(bearer).await?;

			if !request.user_ids_filter.is_empty()
				&& !request.user_ids_filter.iter().any(|id| id == user.as_str())
			{
				return Ok(GetUserDevicesResponse::default());
			}

			let device_filter = request
				.device_ids_filter
				.iter()
				.filter(|id| !id.is_empty())
				.map(String::as_str)
				.collect::<BTreeSet<_>>();
			let devices = self
				.store
				.list_by_owner(&user)
				.await?
				.into_iter()
				.filter(|record| {
					device_filter.is_empty() || device_filter.contains(record.device_id.as_str())
				})
				.map(|record| UserDevice {
					device_id: record.device_id.to_string(),
					user_id: record.owner.to_string(),
				})
				.collect();

			Ok(GetUserDevicesResponse { devices })
		})
		.await
	}

	/// Deletes the listed devices owned by the user behind `bearer`.
	///
	/// Devices the caller does not own, or that are not registered, are skipped.
	pub async fn delete_devices(
		&self,
		bearer: &str,
		request: DeleteDevicesRequest,
	) -> Result<DeleteDevicesResponse> {
		observe(CommandKind::DeleteDevices, "delete_devices", async move {
			let user = self.verifier.verify(bearer).await?;
			let requested = request
				.device_ids
				.iter()
				.filter(|id| !id.is_empty())
				.map(|id| id.parse::<DeviceId>())
				.collect::<Result<BTreeSet<_>, _>>()?;
			let targets = if requested.is_empty() {
				self.store
					.list_by_owner(&user)
					.await?
					.into_iter()
					.map(|record| record.device_id)
					.collect::<BTreeSet<_>>()
			} else {
				requested
			};
			let mut deleted = Vec::with_capacity(targets.len());

			for device_id in targets {
				match self.store.fetch(&device_id).await? {
					Some(record) if record.is_owned_by(&user) => {
						if self.store.remove(&device_id).await?.is_some() {
							self.forget_device_guard(&device_id);
							deleted.push(device_id.to_string());
						}
					},
					Some(_) => {
						tracing::debug!(
							device_id = %device_id,
							user_id = %user,
							"Skipping device owned by another user."
						);
					},
					None => {
						tracing::debug!(device_id = %device_id, "Skipping unregistered device.");
					},
				}
			}

			tracing::info!(user_id = %user, deleted = deleted.len(), "Devices deleted.");

			Ok(DeleteDevicesResponse { device_ids: deleted })
		})
		.await
	}
}
