//! Access token renewal with singleflight guards and compare-and-swap persistence.
//!
//! Each refresh acquires the device's guard, checks the presented refresh token against the
//! stored one, and performs a `grant_type=refresh_token` call. Successful refreshes rotate
//! secrets via `DeviceStore::compare_and_swap_refresh` and reopen signed-out sessions, while
//! invalid_grant/revoked responses sign the device out.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, TokenSecret, UserId},
	error::ConfigError,
	obs::CommandKind,
	service::{AuthorizationService, observe, required},
	store::CompareAndSwapOutcome,
};

/// Refresh request sent by a device.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshTokenRequest {
	/// Device renewing its token.
	pub device_id: String,
	/// User owning the device.
	pub user_id: String,
	/// Refresh token issued at sign-up or the previous refresh.
	pub refresh_token: TokenSecret,
}

/// Renewed credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshTokenResponse {
	/// New access token.
	pub access_token: TokenSecret,
	/// Refresh token to present next time; unchanged when the provider did not rotate it.
	pub refresh_token: TokenSecret,
	/// Seconds until the access token expires; `-1` when it never does.
	pub expires_in: i64,
}

impl AuthorizationService {
	/// Exchanges the device's refresh token for a new access token.
	pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<RefreshTokenResponse> {
		observe(CommandKind::RefreshToken, "refresh_token", async move {
			let device_id: DeviceId = required("device_id", &request.device_id)?;
			let user_id: UserId = required("user_id", &request.user_id)?;

			if request.refresh_token.is_empty() {
				return Err(Error::invalid_argument("refresh_token is required"));
			}

			let guard = self.device_guard(&device_id);
			let _singleflight = guard.lock().await;
			let current = self.owned_device(&device_id, &user_id).await?;
			let expected_refresh = match &current.refresh_token {
				Some(secret) if secret.matches(request.refresh_token.expose()) => secret.clone(),
				_ =>
					return Err(Error::InvalidGrant {
						reason: format!("refresh token does not match device {device_id}"),
					}),
			};
			let tokens = match self.client.refresh(expected_refresh.expose()).await {
				Ok(tokens) => tokens,
				Err(err) => {
					if matches!(err, Error::InvalidGrant { .. } | Error::Revoked) {
						if let Err(store_err) =
							self.store.sign_out(&device_id, OffsetDateTime::now_utc()).await
						{
							tracing::error!(
								device_id = %device_id,
								error = %store_err,
								"Failed to sign out a device after the provider rejected its refresh token."
							);

							return Err(Error::Storage(store_err));
						}

						tracing::info!(
							device_id = %device_id,
							"Provider rejected the refresh token, device signed out."
						);
					}

					return Err(err);
				},
			};
			let updated = DeviceRecord::builder(device_id.clone(), current.owner, current.provider)
				.access_token(tokens.access_token.expose())
				.maybe_refresh_token(tokens.refresh_token.or(Some(expected_refresh.clone())))
				.issued_at(OffsetDateTime::now_utc())
				.maybe_expires_in(tokens.expires_in)
				.build()
				.map_err(ConfigError::from)?;
			let outcome = self
				.store
				.compare_and_swap_refresh(
					&device_id,
					Some(expected_refresh.expose()),
					updated.clone(),
				)
				.await?;

			match outcome {
				CompareAndSwapOutcome::Updated => {},
				CompareAndSwapOutcome::Missing =>
					return Err(Error::unauthenticated(format!(
						"device {device_id} was signed off during refresh"
					))),
				CompareAndSwapOutcome::RefreshMismatch =>
					return Err(Error::InvalidGrant {
						reason: format!("refresh token of device {device_id} was rotated concurrently"),
					}),
			}

			tracing::debug!(
				device_id = %device_id,
				token = %updated.access_token.fingerprint(),
				"Device token refreshed."
			);

			Ok(RefreshTokenResponse {
				expires_in: updated.expires_in(),
				refresh_token: updated.refresh_token.clone().unwrap_or_default(),
				access_token: updated.access_token,
			})
		})
		.await
	}
}
