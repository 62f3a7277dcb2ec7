//! Provider strategy hooks that classify token endpoint failures.
//!
//! Implementations normalize error mapping without tying the OAuth client to any
//! particular HTTP stack.

// self
use crate::{
	_prelude::*,
	error::TransientError,
	provider::GrantType,
};

/// Strategy hook that allows providers to classify token endpoint errors.
///
/// Implementors are required to be `Send + Sync`, and the hook intentionally uses
/// crate-owned data types so callers never depend on reqwest-specific structures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps low-level HTTP/JSON errors into the service taxonomy for a token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the authorization grant (bad code/refresh token).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the token covers.
	InsufficientScope,
	/// Provider reported the presented token as revoked.
	Revoked,
	/// Failure is temporary and should be retried.
	Transient,
}
impl ProviderErrorKind {
	/// Converts the classification into a service [`Error`] carrying `message`.
	pub fn into_error(
		self,
		message: String,
		status: Option<u16>,
		retry_after: Option<Duration>,
	) -> Error {
		match self {
			Self::InvalidGrant => Error::InvalidGrant { reason: message },
			Self::InvalidClient => Error::InvalidClient { reason: message },
			Self::InsufficientScope => Error::InsufficientScope { reason: message },
			Self::Revoked => Error::Revoked,
			Self::Transient =>
				TransientError::TokenEndpoint { message, status, retry_after }.into(),
		}
	}
}

/// Context passed to provider strategies when classifying token errors.
///
/// The struct keeps only primitive data (status codes, OAuth fields, body preview) so
/// strategies stay decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON or unexpected payloads.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return unexpected payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC-guided heuristics.
///
/// It prioritizes structured OAuth fields (`error`, `error_description`), then falls back
/// to body text hints, and finally the HTTP status code.
///
/// GitHub answers failed exchanges with `200 OK` and an `error` of `bad_verification_code`
/// or `bad_refresh_token`; both classify as invalid grants.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	const INVALID_GRANT: &[&str] =
		&["invalid_grant", "access_denied", "bad_verification_code", "bad_refresh_token"];
	const INVALID_CLIENT: &[&str] =
		&["invalid_client", "unauthorized_client", "incorrect_client_credentials"];
	const INSUFFICIENT_SCOPE: &[&str] = &["invalid_scope", "insufficient_scope"];
	const REVOKED: &[&str] = &["token_revoked", "revoked_token"];
	const TRANSIENT: &[&str] = &["temporarily_unavailable", "server_error", "slow_down"];

	let matches = |set: &[&str]| set.iter().any(|candidate| value.eq_ignore_ascii_case(candidate));

	if matches(INVALID_GRANT) {
		Some(ProviderErrorKind::InvalidGrant)
	} else if matches(INVALID_CLIENT) {
		Some(ProviderErrorKind::InvalidClient)
	} else if matches(INSUFFICIENT_SCOPE) {
		Some(ProviderErrorKind::InsufficientScope)
	} else if matches(REVOKED) {
		Some(ProviderErrorKind::Revoked)
	} else if matches(TRANSIENT) {
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant")
			|| text.contains("bad_verification_code")
			|| text.contains("bad_refresh_token") =>
			Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InsufficientScope),
		text if text.contains("revoked") => Some(ProviderErrorKind::Revoked),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn oauth_error_field_wins_over_status() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("invalid_client")
			.with_http_status(400);

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidClient);
	}

	#[test]
	fn description_and_body_are_consulted_in_order() {
		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_oauth_error("custom_error")
			.with_error_description("The refresh token has been revoked")
			.with_body_preview("invalid_grant");

		assert_eq!(classify(ctx), ProviderErrorKind::Revoked);

		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_body_preview(r#"{"error":"bad_verification_code"}"#)
			.with_http_status(200);

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn status_fallback_applies_last() {
		let status = |code| classify(ProviderErrorContext::new(GrantType::RefreshToken).with_http_status(code));

		assert_eq!(status(400), ProviderErrorKind::InvalidGrant);
		assert_eq!(status(401), ProviderErrorKind::InvalidClient);
		assert_eq!(status(403), ProviderErrorKind::InsufficientScope);
		assert_eq!(status(429), ProviderErrorKind::Transient);
		assert_eq!(status(503), ProviderErrorKind::Transient);
		assert_eq!(status(200), ProviderErrorKind::Transient);
	}

	#[test]
	fn body_preview_is_truncated() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken).with_body_preview("x".repeat(1_000));
		let preview = ctx.body_preview.expect("Preview should be stored.");

		assert_eq!(preview.chars().count(), ProviderErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}

	#[test]
	fn kinds_map_into_service_errors() {
		assert!(matches!(
			ProviderErrorKind::InvalidGrant.into_error("bad code".into(), Some(400), None),
			Error::InvalidGrant { .. }
		));
		assert!(matches!(
			ProviderErrorKind::Revoked.into_error("revoked".into(), None, None),
			Error::Revoked
		));
		assert!(matches!(
			ProviderErrorKind::Transient.into_error("busy".into(), Some(503), Some(Duration::seconds(5))),
			Error::Transient(TransientError::TokenEndpoint { status: Some(503), .. })
		));
	}
}
