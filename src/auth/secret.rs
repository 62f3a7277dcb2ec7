//! Opaque token wrapper that keeps sensitive material out of logs.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Opaque token issued by a provider; only ever presented back, never interpreted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true when the wrapped token is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compares against a presented token without short-circuiting on the first mismatch.
	pub fn matches(&self, presented: &str) -> bool {
		let lhs = self.0.as_bytes();
		let rhs = presented.as_bytes();

		if lhs.len() != rhs.len() {
			return false;
		}

		lhs.iter().zip(rhs).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
	}

	/// Short, log-safe digest of the token (base64 SHA-256, first 12 characters).
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());
		let mut encoded = STANDARD_NO_PAD.encode(digest);

		encoded.truncate(12);

		encoded
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
