//! Device records, session lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, ProviderName, TokenSecret, UserId},
};

/// Current lifecycle status for a device session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because the issued-at instant is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
	/// Device signed out; the token stays invalid until a refresh succeeds.
	SignedOut,
}

/// Errors produced by [`DeviceRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DeviceRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// Device registered with the hub together with the provider tokens it presents.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
	/// Registered device.
	pub device_id: DeviceId,
	/// User that signed the device up.
	pub owner: UserId,
	/// Provider that issued the tokens.
	pub provider: ProviderName,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Issued-at instant recorded when the tokens were stored.
	pub issued_at: OffsetDateTime,
	/// Expiry instant; `None` means the token never expires.
	pub expires_at: Option<OffsetDateTime>,
	/// Sign-out instant if the device signed out.
	pub signed_out_at: Option<OffsetDateTime>,
}
impl DeviceRecord {
	/// Returns a builder for constructing device records.
	pub fn builder(
		device_id: DeviceId,
		owner: UserId,
		provider: ProviderName,
	) -> DeviceRecordBuilder {
		DeviceRecordBuilder::new(device_id, owner, provider)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.signed_out_at.is_some() {
			return TokenStatus::SignedOut;
		}
		if instant < self.issued_at {
			return TokenStatus::Pending;
		}
		if matches!(self.expires_at, Some(expires_at) if instant >= expires_at) {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the record is currently active.
	pub fn is_active(&self) -> bool {
		matches!(self.status(), TokenStatus::Active)
	}

	/// Returns `true` if the device has signed out.
	pub fn is_signed_out(&self) -> bool {
		self.signed_out_at.is_some()
	}

	/// Whole seconds until expiry at `instant`, clamped at zero; `-1` when the token never
	/// expires.
	pub fn expires_in_at(&self, instant: OffsetDateTime) -> i64 {
		match self.expires_at {
			Some(expires_at) => (expires_at - instant).whole_seconds().max(0),
			None => -1,
		}
	}

	/// [`Self::expires_in_at`] relative to the current clock.
	pub fn expires_in(&self) -> i64 {
		self.expires_in_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` when `user` owns the device.
	pub fn is_owned_by(&self, user: &UserId) -> bool {
		&self.owner == user
	}

	/// Marks the device as signed out; an earlier sign-out instant is kept.
	pub fn sign_out(&mut self, instant: OffsetDateTime) {
		self.signed_out_at.get_or_insert(instant);
	}
}
impl Debug for DeviceRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DeviceRecord")
			.field("device_id", &self.device_id)
			.field("owner", &self.owner)
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("signed_out_at", &self.signed_out_at)
			.finish()
	}
}

/// Builder for [`DeviceRecord`].
#[derive(Clone, Debug)]
pub struct DeviceRecordBuilder {
	device_id: DeviceId,
	owner: UserId,
	provider: ProviderName,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl DeviceRecordBuilder {
	fn new(device_id: DeviceId, owner: UserId, provider: ProviderName) -> Self {
		Self {
			device_id,
			owner,
			provider,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the relative expiry when one is known; `None` keeps the token non-expiring.
	pub fn maybe_expires_in(mut self, duration: Option<Duration>) -> Self {
		self.expires_in = duration;

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an optional refresh token secret.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Consumes the builder and produces a [`DeviceRecord`].
	pub fn build(self) -> Result<DeviceRecord, DeviceRecordBuilderError> {
		let access_token = self
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(DeviceRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(issued_at + delta),
			(None, None) => None,
		};

		Ok(DeviceRecord {
			device_id: self.device_id,
			owner: self.owner,
			provider: self.provider,
			access_token,
			refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
			issued_at,
			expires_at,
			signed_out_at: None,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn builder() -> DeviceRecordBuilder {
		DeviceRecord::builder(
			DeviceId::new("dev-1").expect("Device fixture should be valid."),
			UserId::new("user-1").expect("User fixture should be valid."),
			ProviderName::new("github").expect("Provider fixture should be valid."),
		)
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let mut record = builder()
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(issued)
			.expires_at(expires)
			.build()
			.expect("Device record builder should succeed for status transitions.");

		assert_eq!(record.status_at(macros::datetime!(2024-12-31 23:59 UTC)), TokenStatus::Pending);
		assert_eq!(record.status_at(macros::datetime!(2025-01-01 00:30 UTC)), TokenStatus::Active);
		assert_eq!(record.status_at(macros::datetime!(2025-01-01 01:00 UTC)), TokenStatus::Expired);

		record.sign_out(macros::datetime!(2025-01-01 00:10 UTC));

		assert_eq!(
			record.status_at(macros::datetime!(2024-12-31 23:59 UTC)),
			TokenStatus::SignedOut,
			"Sign-out takes precedence over every other state."
		);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-01 02:00 UTC)),
			TokenStatus::SignedOut
		);
	}

	#[test]
	fn expires_in_reports_remaining_seconds() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let record = builder()
			.access_token("access")
			.issued_at(issued)
			.expires_in(Duration::minutes(5))
			.build()
			.expect("Relative expiry should build.");

		assert_eq!(record.expires_at, Some(macros::datetime!(2025-01-01 00:05 UTC)));
		assert_eq!(record.expires_in_at(macros::datetime!(2025-01-01 00:04:30.5 UTC)), 29);
		assert_eq!(record.expires_in_at(macros::datetime!(2025-01-01 01:00 UTC)), 0);
	}

	#[test]
	fn tokens_without_expiry_never_expire() {
		let record = builder()
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.maybe_expires_in(None)
			.build()
			.expect("Missing expiry should be accepted.");

		assert_eq!(record.expires_at, None);
		assert_eq!(record.expires_in_at(macros::datetime!(2999-01-01 00:00 UTC)), -1);
		assert_eq!(record.status_at(macros::datetime!(2999-01-01 00:00 UTC)), TokenStatus::Active);
	}

	#[test]
	fn builder_requires_access_token_and_drops_blank_refresh() {
		assert_eq!(builder().build().unwrap_err(), DeviceRecordBuilderError::MissingAccessToken);
		assert_eq!(
			builder().access_token("").build().unwrap_err(),
			DeviceRecordBuilderError::MissingAccessToken
		);

		let record = builder()
			.access_token("access")
			.refresh_token("")
			.build()
			.expect("Blank refresh token should be tolerated.");

		assert!(record.refresh_token.is_none());
	}

	#[test]
	fn debug_redacts_secrets() {
		let record = builder()
			.access_token("access-secret")
			.refresh_token("refresh-secret")
			.build()
			.expect("Record should build.");
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(rendered.contains("dev-1"));
	}
}
