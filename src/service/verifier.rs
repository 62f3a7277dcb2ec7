//! Bearer credential verification for user-scoped commands.

// self
use crate::{_prelude::*, auth::UserId, store::DeviceStore};

/// Boxed future returned by [`TokenVerifier::verify`].
pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = Result<UserId>> + 'a + Send>>;

/// Resolves a bearer credential to the user it authenticates.
pub trait TokenVerifier
where
	Self: Send + Sync,
{
	/// Returns the authenticated user or [`Error::Unauthenticated`].
	fn verify<'a>(&'a self, bearer: &'a str) -> VerifyFuture<'a>;
}

/// Accepts access tokens of active device sessions and returns their owner.
#[derive(Clone)]
pub struct StoreTokenVerifier {
	store: Arc<dyn DeviceStore>,
}
impl StoreTokenVerifier {
	/// Creates a verifier backed by `store`.
	pub fn new(store: Arc<dyn DeviceStore>) -> Self {
		Self { store }
	}
}
impl TokenVerifier for StoreTokenVerifier {
	fn verify<'a>(&'a self, bearer: &'a str) -> VerifyFuture<'a> {
		Box::pin(async move {
			if bearer.is_empty() {
				return Err(Error::unauthenticated("bearer token is missing"));
			}

			match self.store.find_by_access_token(bearer).await? {
				Some(record) if record.is_active() => Ok(record.owner),
				Some(_) => Err(Error::unauthenticated("bearer token is no longer active")),
				None => Err(Error::unauthenticated("bearer token is unknown")),
			}
		})
	}
}
impl Debug for StoreTokenVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StoreTokenVerifier(..)")
	}
}
