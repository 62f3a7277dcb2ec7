//! Service-level error types shared across commands, providers, and stores.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical service error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or service-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., bad code or refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or service-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or service-supplied reason string.
		reason: String,
	},
	/// Token has been revoked and must not be reused.
	#[error("Token has been revoked.")]
	Revoked,

	/// Request is missing mandatory fields or carries malformed values.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// Description of the offending field.
		reason: String,
	},
	/// Caller could not be authenticated.
	#[error("Unauthenticated: {reason}.")]
	Unauthenticated {
		/// Description of the failed check.
		reason: String,
	},
	/// Caller is authenticated but not allowed to touch the resource.
	#[error("Permission denied: {reason}.")]
	PermissionDenied {
		/// Description of the failed check.
		reason: String,
	},
	/// Requested route or resource does not exist; answered for unknown RPC paths.
	#[error("Not found: {reason}.")]
	NotFound {
		/// Description of the missing resource.
		reason: String,
	},
}
impl Error {
	/// Builds an [`Error::InvalidArgument`].
	pub fn invalid_argument(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}

	/// Builds an [`Error::Unauthenticated`].
	pub fn unauthenticated(reason: impl Into<String>) -> Self {
		Self::Unauthenticated { reason: reason.into() }
	}

	/// Builds an [`Error::PermissionDenied`].
	pub fn permission_denied(reason: impl Into<String>) -> Self {
		Self::PermissionDenied { reason: reason.into() }
	}

	/// Stable snake_case label for the error kind, used on the wire and in logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Storage(_) => "storage",
			Self::Config(_) => "config",
			Self::Transient(_) => "transient",
			Self::Transport(_) => "transport",
			Self::InsufficientScope { .. } => "insufficient_scope",
			Self::InvalidGrant { .. } => "invalid_grant",
			Self::InvalidClient { .. } => "invalid_client",
			Self::Revoked => "revoked",
			Self::InvalidArgument { .. } => "invalid_argument",
			Self::Unauthenticated { .. } => "unauthenticated",
			Self::PermissionDenied { .. } => "permission_denied",
			Self::NotFound { .. } => "not_found",
		}
	}
}
impl From<crate::auth::IdentifierError> for Error {
	fn from(e: crate::auth::IdentifierError) -> Self {
		Self::invalid_argument(e.to_string())
	}
}

/// Configuration and validation failures raised by the service.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An OAuth endpoint URL cannot be parsed.
	#[error("The {endpoint} URL is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Environment settings could not be loaded.
	#[error("Settings could not be loaded.")]
	Settings(#[from] config::ConfigError),
	/// A setting holds a value the service cannot use.
	#[error("Setting `{key}` is invalid: {reason}.")]
	InvalidSetting {
		/// Environment key of the setting.
		key: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Well-known configuration document is unusable.
	#[error("Could not retrieve the well-known configuration.")]
	WellKnown {
		/// Underlying fetch or validation failure.
		#[source]
		source: BoxError,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Device record builder validation failed.
	#[error("Unable to build device record.")]
	RecordBuild(#[from] crate::auth::DeviceRecordBuilderError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a well-known fetch or validation failure.
	pub fn well_known(src: impl Into<BoxError>) -> Self {
		Self::WellKnown { source: src.into() }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or service-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authorization service answered with a retryable failure.
	#[error("Authorization service is unavailable: {message}.")]
	Unavailable {
		/// Message returned by the service.
		message: String,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kinds_are_stable_labels() {
		assert_eq!(Error::invalid_argument("device id").kind(), "invalid_argument");
		assert_eq!(Error::unauthenticated("token").kind(), "unauthenticated");
		assert_eq!(Error::permission_denied("owner").kind(), "permission_denied");
		assert_eq!(Error::Revoked.kind(), "revoked");
	}

	#[test]
	fn identifier_errors_become_invalid_arguments() {
		let err: Error = crate::auth::DeviceId::new("").expect_err("Empty id must fail.").into();

		assert!(matches!(err, Error::InvalidArgument { .. }));
		assert!(err.to_string().contains("Device identifier cannot be empty"));
	}
}
