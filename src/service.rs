//! Command handlers of the authorization service.
//!
//! [`AuthorizationService`] owns the device store, the device provider client, and the
//! bearer verifier. Each command lives in its own module:
//!
//! - `sign_up`: exchanges an authorization code and registers the device.
//! - `session`: sign in, sign out, and sign off for registered devices.
//! - `refresh`: renews access tokens behind a per-device singleflight guard with
//!   compare-and-swap persistence.
//! - `devices`: user-scoped device listing and bulk deletion.
//! - `verifier`: resolves bearer credentials to users.

pub mod devices;
pub mod refresh;
pub mod session;
pub mod sign_up;
pub mod verifier;

pub use devices::*;
pub use refresh::*;
pub use session::*;
pub use sign_up::*;
pub use verifier::*;

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, DeviceRecord, ProviderName, UserId},
	oauth::OAuthClient,
	obs::{self, CommandKind, CommandOutcome, CommandSpan},
	store::DeviceStore,
};

/// Authorization service bound to one device provider.
#[derive(Clone)]
pub struct AuthorizationService {
	/// Store holding registered devices.
	pub store: Arc<dyn DeviceStore>,
	/// Client for the device OAuth provider.
	pub client: OAuthClient,
	/// Name devices must present when they sign up.
	pub provider: ProviderName,
	/// Resolves bearer credentials for user-scoped commands.
	pub verifier: Arc<dyn TokenVerifier>,
	device_guards: Arc<Mutex<HashMap<DeviceId, Arc<AsyncMutex<()>>>>>,
}
impl AuthorizationService {
	/// Creates a service that verifies bearers against the device store.
	pub fn new(store: Arc<dyn DeviceStore>, client: OAuthClient, provider: ProviderName) -> Self {
		let verifier = Arc::new(StoreTokenVerifier::new(store.clone()));

		Self { store, client, provider, verifier, device_guards: Default::default() }
	}

	/// Replaces the bearer verifier.
	pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
		self.verifier = verifier;

		self
	}

	/// Returns (and creates on demand) the singleflight guard for a device.
	pub(crate) fn device_guard(&self, device_id: &DeviceId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.device_guards.lock();

		guards.entry(device_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the guard of a removed device.
	pub(crate) fn forget_device_guard(&self, device_id: &DeviceId) {
		self.device_guards.lock().remove(device_id);
	}

	/// Loads a device and checks that `user` owns it.
	pub(crate) async fn owned_device(
		&self,
		device_id: &DeviceId,
		user: &UserId,
	) -> Result<DeviceRecord> {
		let record = self
			.store
			.fetch(device_id)
			.await?
			.ok_or_else(|| Error::unauthenticated(format!("device {device_id} is not registered")))?;

		if !record.is_owned_by(user) {
			return Err(Error::permission_denied(format!(
				"device {device_id} is not owned by user {user}"
			)));
		}

		Ok(record)
	}
}
impl Debug for AuthorizationService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationService")
			.field("client", &self.client)
			.field("provider", &self.provider)
			.finish_non_exhaustive()
	}
}

/// Runs a command inside its span and records the outcome.
pub(crate) async fn observe<T, F>(kind: CommandKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = CommandSpan::new(kind, stage);

	obs::record_command_outcome(kind, CommandOutcome::Attempt);

	let result = span
		.instrument(async move {
			let result = fut.await;

			if let Err(e) = &result {
				tracing::debug!(kind = e.kind(), error = %e, "Command failed.");
			}

			result
		})
		.await;

	match &result {
		Ok(_) => obs::record_command_outcome(kind, CommandOutcome::Success),
		Err(_) => obs::record_command_outcome(kind, CommandOutcome::Failure),
	}

	result
}

/// Parses a mandatory identifier field, naming the field when it is absent.
pub(crate) fn required<T>(field: &'static str, value: &str) -> Result<T>
where
	T: FromStr<Err = crate::auth::IdentifierError>,
{
	if value.is_empty() {
		return Err(Error::invalid_argument(format!("{field} is required")));
	}

	Ok(value.parse::<T>()?)
}
