//! Device sign-up through the authorization code grant.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, ProviderName, TokenSecret},
	error::ConfigError,
	obs::CommandKind,
	service::{AuthorizationService, observe, required},
};

/// Sign-up request sent by a device after the user completed the provider login.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignUpRequest {
	/// Device registering itself.
	pub device_id: String,
	/// Authorization code obtained from the provider.
	pub authorization_code: TokenSecret,
	/// Provider the code was issued by; empty means the configured one.
	pub auth_provider: String,
}

/// Credentials handed back to a device that signed up.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignUpResponse {
	/// Opaque access token the device presents when it signs in.
	pub access_token: TokenSecret,
	/// Owner of the device.
	pub user_id: String,
	/// Refresh token; empty when the provider issued none.
	pub refresh_token: TokenSecret,
	/// Seconds until the access token expires; `-1` when it never does.
	pub expires_in: i64,
	/// Redirect URI registered for the device client.
	pub redirect_uri: String,
}

impl AuthorizationService {
	/// Exchanges the authorization code and registers the device to the code's owner.
	pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse> {
		observe(CommandKind::SignUp, "sign_up", async move {
			let device_id: DeviceId = required("device_id", &request.device_id)?;

			if request.authorization_code.is_empty() {
				return Err(Error::invalid_argument("authorization_code is required"));
			}
			if !request.auth_provider.is_empty() {
				let presented: ProviderName = request.auth_provider.parse()?;

				if presented != self.provider {
					return Err(Error::invalid_argument(format!(
						"auth_provider {presented} is not supported, expected {}",
						self.provider
					)));
				}
			}

			let tokens = self.client.exchange_code(request.authorization_code.expose()).await?;
			let owner = self.client.owner_from(&tokens)?;
			// Held through the save so a concurrent sign-up sees this owner.
			let guard = self.device_guard(&device_id);
			let _singleflight = guard.lock().await;
			let existing = self.store.fetch(&device_id).await?;

			if existing.is_some_and(|record| !record.is_owned_by(&owner)) {
				return Err(Error::permission_denied(format!(
					"device {device_id} is already registered to another user"
				)));
			}

			let record = DeviceRecord::builder(device_id, owner, self.provider.clone())
				.access_token(tokens.access_token.expose())
				.maybe_refresh_token(tokens.refresh_token)
				.issued_at(OffsetDateTime::now_utc())
				.maybe_expires_in(tokens.expires_in)
				.build()
				.map_err(ConfigError::from)?;
			let response = SignUpResponse {
				access_token: record.access_token.clone(),
				user_id: record.owner.to_string(),
				refresh_token: record.refresh_token.clone().unwrap_or_default(),
				expires_in: record.expires_in(),
				redirect_uri: self.client.config().redirect_url.clone(),
			};

			tracing::info!(
				device_id = %record.device_id,
				user_id = %record.owner,
				token = %record.access_token.fingerprint(),
				"Device signed up."
			);

			self.store.save(record).await?;

			Ok(response)
		})
		.await
	}
}
