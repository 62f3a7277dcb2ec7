//! Observability helpers for service commands.
//!
//! - Every command runs inside a `hub_authorization.command` span carrying the `command` and
//!   `stage` fields.
//! - Enable the `metrics` feature to increment the `hub_authorization_command_total` counter for
//!   every attempt/success/failure, labeled by `command` + `outcome`.
//! - [`init_logging`] installs the process-wide subscriber used by the binary.

mod logging;
mod metrics;
mod span;

pub use logging::*;
pub use metrics::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Commands observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
	/// Device sign-up through an authorization code.
	SignUp,
	/// Device sign-in with its access token.
	SignIn,
	/// Reversible device sign-out.
	SignOut,
	/// Irreversible device removal.
	SignOff,
	/// Access token renewal.
	RefreshToken,
	/// Device listing for the calling user.
	GetUserDevices,
	/// Bulk device removal for the calling user.
	DeleteDevices,
	/// Service-to-service token acquisition.
	ServiceToken,
}
impl CommandKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CommandKind::SignUp => "sign_up",
			CommandKind::SignIn => "sign_in",
			CommandKind::SignOut => "sign_out",
			CommandKind::SignOff => "sign_off",
			CommandKind::RefreshToken => "refresh_token",
			CommandKind::GetUserDevices => "get_user_devices",
			CommandKind::DeleteDevices => "delete_devices",
			CommandKind::ServiceToken => "service_token",
		}
	}
}
impl Display for CommandKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandOutcome {
	/// Entry to a command.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CommandOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CommandOutcome::Attempt => "attempt",
			CommandOutcome::Success => "success",
			CommandOutcome::Failure => "failure",
		}
	}
}
impl Display for CommandOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
