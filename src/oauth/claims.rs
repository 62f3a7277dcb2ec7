//! Unverified JWT payload decoding for owner extraction.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::UserId};

/// Reads `claim` from the payload of a compact JWT.
///
/// Signatures are not checked; tokens reach this point straight from the provider's
/// token endpoint.
pub(crate) fn owner_claim(token: &str, claim: &str) -> Result<UserId> {
	let claims = decode_payload(token)?;
	let value = match claims.get(claim) {
		Some(Value::String(value)) => value.clone(),
		Some(Value::Number(value)) => value.to_string(),
		Some(_) =>
			return Err(Error::InvalidGrant {
				reason: format!("owner claim `{claim}` is not a string"),
			}),
		None =>
			return Err(Error::InvalidGrant { reason: format!("owner claim `{claim}` is missing") }),
	};

	UserId::new(value).map_err(|e| Error::InvalidGrant { reason: e.to_string() })
}

/// Returns `true` when the token has the three-segment compact JWT shape.
pub(crate) fn looks_like_jwt(token: &str) -> bool {
	token.split('.').count() == 3 && token.split('.').take(2).all(|segment| !segment.is_empty())
}

fn decode_payload(token: &str) -> Result<Map<String, Value>> {
	let malformed = |detail: &str| Error::InvalidGrant { reason: format!("ID token is malformed: {detail}") };

	if !looks_like_jwt(token) {
		return Err(malformed("expected three segments"));
	}

	let payload = token.split('.').nth(1).ok_or_else(|| malformed("missing payload"))?;
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|_| malformed("payload is not base64url"))?;

	serde_json::from_slice::<Map<String, Value>>(&bytes)
		.map_err(|_| malformed("payload is not a JSON object"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn token(payload: &str) -> String {
		format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn reads_string_and_numeric_claims() {
		let owner = owner_claim(&token(r#"{"sub":"user-1","uid":42}"#), "sub")
			.expect("String claim should decode.");

		assert_eq!(owner.as_str(), "user-1");
		assert_eq!(
			owner_claim(&token(r#"{"sub":"user-1","uid":42}"#), "uid")
				.expect("Numeric claim should decode.")
				.as_str(),
			"42"
		);
	}

	#[test]
	fn missing_or_malformed_claims_are_invalid_grants() {
		for (token, claim) in [
			(token(r#"{"email":"a@b.c"}"#), "sub"),
			(token(r#"{"sub":["a"]}"#), "sub"),
			(token(r#"{"sub":""}"#), "sub"),
			("opaque-token".to_owned(), "sub"),
			("a.!!!.c".to_owned(), "sub"),
		] {
			assert!(
				matches!(owner_claim(&token, claim), Err(Error::InvalidGrant { .. })),
				"{token} should be rejected."
			);
		}
	}

	#[test]
	fn jwt_shape_detection() {
		assert!(looks_like_jwt("a.b.c"));
		assert!(looks_like_jwt("a.b."));
		assert!(!looks_like_jwt("gho_opaque"));
		assert!(!looks_like_jwt(".b.c"));
	}
}
