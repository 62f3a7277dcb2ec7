//! Error responses on the wire.

// crates.io
use axum::{
	Json,
	extract::{FromRequest, Request, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
};

/// JSON body of every failed call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
	/// Snake_case error kind, see [`Error::kind`].
	pub code: String,
	/// Human-readable message.
	pub message: String,
}
impl ErrorBody {
	/// Rebuilds the service error a peer reported.
	///
	/// Kinds that only make sense locally (`storage`, `config`, `transport`, unknown codes)
	/// come back as [`TransientError::Unavailable`] or [`ConfigError::InvalidSetting`].
	pub fn into_error(self, status: StatusCode) -> Error {
		let reason = self.message;

		match self.code.as_str() {
			"invalid_argument" => Error::InvalidArgument { reason },
			"invalid_grant" => Error::InvalidGrant { reason },
			"invalid_client" => Error::InvalidClient { reason },
			"insufficient_scope" => Error::InsufficientScope { reason },
			"revoked" => Error::Revoked,
			"unauthenticated" => Error::Unauthenticated { reason },
			"permission_denied" => Error::PermissionDenied { reason },
			"not_found" => Error::NotFound { reason },
			"config" => ConfigError::InvalidSetting { key: "remote", reason }.into(),
			_ if status == StatusCode::UNAUTHORIZED => Error::Unauthenticated { reason },
			_ => TransientError::Unavailable { message: format!("HTTP {status}: {reason}") }.into(),
		}
	}
}

/// HTTP status a service error is answered with.
pub fn status_of(error: &Error) -> StatusCode {
	match error {
		Error::InvalidArgument { .. } | Error::InvalidGrant { .. } => StatusCode::BAD_REQUEST,
		Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
		Error::PermissionDenied { .. } | Error::InsufficientScope { .. } => StatusCode::FORBIDDEN,
		Error::NotFound { .. } => StatusCode::NOT_FOUND,
		Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
		Error::Transport(_) => StatusCode::BAD_GATEWAY,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = status_of(&self);

		if status.is_server_error() {
			tracing::warn!(kind = self.kind(), error = %self, "Request failed.");
		}

		let body = ErrorBody { code: self.kind().into(), message: self.to_string() };

		(status, Json(body)).into_response()
	}
}

/// JSON body extractor whose rejections are answered as [`Error::InvalidArgument`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RpcJson<T>(pub T);
impl<S, T> FromRequest<S> for RpcJson<T>
where
	Json<T>: FromRequest<S, Rejection = JsonRejection>,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let Json(value) = Json::<T>::from_request(req, state)
			.await
			.map_err(|e| Error::invalid_argument(e.body_text()))?;

		Ok(Self(value))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn statuses_follow_error_kinds() {
		assert_eq!(status_of(&Error::invalid_argument("x")), StatusCode::BAD_REQUEST);
		assert_eq!(
			status_of(&Error::InvalidGrant { reason: "x".into() }),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(status_of(&Error::unauthenticated("x")), StatusCode::UNAUTHORIZED);
		assert_eq!(status_of(&Error::permission_denied("x")), StatusCode::FORBIDDEN);
		assert_eq!(
			status_of(&Error::InsufficientScope { reason: "x".into() }),
			StatusCode::FORBIDDEN
		);
		assert_eq!(status_of(&Error::NotFound { reason: "x".into() }), StatusCode::NOT_FOUND);
		assert_eq!(
			status_of(&TransientError::Unavailable { message: "x".into() }.into()),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(
			status_of(&crate::error::TransportError::Io(std::io::Error::other("x")).into()),
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(status_of(&Error::Revoked), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn error_bodies_decode_to_matching_kinds() {
		let body = |code: &str| ErrorBody { code: code.into(), message: "m".into() };

		assert!(matches!(
			body("permission_denied").into_error(StatusCode::FORBIDDEN),
			Error::PermissionDenied { .. }
		));
		assert!(matches!(body("revoked").into_error(StatusCode::INTERNAL_SERVER_ERROR), Error::Revoked));
		assert!(matches!(body("").into_error(StatusCode::UNAUTHORIZED), Error::Unauthenticated { .. }));
		assert!(matches!(
			body("storage").into_error(StatusCode::INTERNAL_SERVER_ERROR),
			Error::Transient(TransientError::Unavailable { .. })
		));
	}
}
