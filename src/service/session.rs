//! Device sessions: sign in, sign out, and sign off.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, TokenSecret, TokenStatus, UserId},
	obs::CommandKind,
	service::{AuthorizationService, observe, required},
};

/// Identifies a device session; shared by sign in, sign out, and sign off.
///
/// An empty `access_token` is taken from the caller's bearer credential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSessionRequest {
	/// Device the session belongs to.
	pub device_id: String,
	/// User owning the device.
	pub user_id: String,
	/// Access token issued at sign-up or refresh.
	pub access_token: TokenSecret,
}

/// Sign-in request.
pub type SignInRequest = DeviceSessionRequest;
/// Sign-out request.
pub type SignOutRequest = DeviceSessionRequest;
/// Sign-off request.
pub type SignOffRequest = DeviceSessionRequest;

/// Result of a successful sign-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignInResponse {
	/// Seconds until the access token expires; `-1` when it never does.
	pub expires_in: i64,
}

/// Empty acknowledgement returned by sign out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOutResponse {}

/// Empty acknowledgement returned by sign off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOffResponse {}

impl AuthorizationService {
	/// Validates a device's access token; the session must be active.
	pub async fn sign_in(&self, bearer: &str, request: SignInRequest) -> Result<SignInResponse> {
		observe(CommandKind::SignIn, "sign_in", async move {
			let record = self.authorize_session(bearer, &request).await?;
			let now = OffsetDateTime::now_utc();

			match record.status_at(now) {
				TokenStatus::Active => {},
				TokenStatus::SignedOut =>
					return Err(Error::unauthenticated(format!(
						"device {} is signed out",
						record.device_id
					))),
				TokenStatus::Expired =>
					return Err(Error::unauthenticated(format!(
						"access token of device {} expired",
						record.device_id
					))),
				TokenStatus::Pending =>
					return Err(Error::unauthenticated(format!(
						"access token of device {} is not valid yet",
						record.device_id
					))),
			}

			tracing::debug!(device_id = %record.device_id, "Device signed in.");

			Ok(SignInResponse { expires_in: record.expires_in_at(now) })
		})
		.await
	}

	/// Invalidates a device's access token while keeping the device registered.
	///
	/// Signing out twice is not an error; a successful refresh reopens the session.
	pub async fn sign_out(&self, bearer: &str, request: SignOutRequest) -> Result<SignOutResponse> {
		observe(CommandKind::SignOut, "sign_out", async move {
			let record = self.authorize_session(bearer, &request).await?;

			if !record.is_signed_out() {
				self.store.sign_out(&record.device_id, OffsetDateTime::now_utc()).await?;

				tracing::info!(device_id = %record.device_id, "Device signed out.");
			}

			Ok(SignOutResponse {})
		})
		.await
	}

	/// Removes the device and every credential it holds.
	pub async fn sign_off(&self, bearer: &str, request: SignOffRequest) -> Result<SignOffResponse> {
		observe(CommandKind::SignOff, "sign_off", async move {
			let record = self.authorize_session(bearer, &request).await?;

			self.store.remove(&record.device_id).await?;
			self.forget_device_guard(&record.device_id);

			tracing::info!(device_id = %record.device_id, user_id = %record.owner, "Device signed off.");

			Ok(SignOffResponse {})
		})
		.await
	}

	async fn authorize_session(
		&self,
		bearer: &str,
		request: &DeviceSessionRequest,
	) -> Result<DeviceRecord> {
		let device_id: DeviceId = required("device_id", &request.device_id)?;
		let user_id: UserId = required("user_id", &request.user_id)?;
		let access_token =
			if request.access_token.is_empty() { bearer } else { request.access_token.expose() };

		if access_token.is_empty() {
			return Err(Error::invalid_argument("access_token is required"));
		}

		let record = self.owned_device(&device_id, &user_id).await?;

		if !record.access_token.matches(access_token) {
			return Err(Error::unauthenticated(format!(
				"access token does not match device {device_id}"
			)));
		}

		Ok(record)
	}
}
