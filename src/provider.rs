//! Provider-facing grant identifiers and error classification strategies.
//!
//! [`ProviderStrategy`] is an HTTP-client-agnostic hook the OAuth client uses to map
//! token endpoint failures into the service error taxonomy. [`GrantType`] labels which
//! exchange failed so strategies and logs can tell sign-up, refresh, and service-token
//! traffic apart.

pub mod grant;
pub mod strategy;

pub use grant::*;
pub use strategy::*;
