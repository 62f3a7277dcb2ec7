//! `Authorization: Bearer` extraction.

// crates.io
use axum::{
	extract::Request,
	http::{HeaderMap, header},
	middleware::Next,
	response::Response,
};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Bearer credential of the current request, stored in request extensions.
#[derive(Clone, Debug)]
pub struct Bearer(pub TokenSecret);
impl Bearer {
	/// Raw credential.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}

/// Rejects requests without a well-formed bearer before any handler runs.
pub async fn require_bearer(mut req: Request, next: Next) -> Result<Response> {
	let bearer = bearer_from_headers(req.headers())?;

	req.extensions_mut().insert(bearer);

	Ok(next.run(req).await)
}

/// Reads the bearer credential from `Authorization`.
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<Bearer> {
	let value = headers
		.get(header::AUTHORIZATION)
		.ok_or_else(|| Error::unauthenticated("authorization header is missing"))?
		.to_str()
		.map_err(|_| Error::unauthenticated("authorization header is not valid ASCII"))?;
	let (scheme, token) = value
		.split_once(' ')
		.ok_or_else(|| Error::unauthenticated("authorization header is malformed"))?;

	if !scheme.eq_ignore_ascii_case("bearer") {
		return Err(Error::unauthenticated(format!("authorization scheme {scheme} is not supported")));
	}

	let token = token.trim();

	if token.is_empty() {
		return Err(Error::unauthenticated("bearer token is empty"));
	}

	Ok(Bearer(TokenSecret::new(token)))
}
