//! Auth-domain identifiers, scope sets, token secrets, and device records.

pub mod id;
pub mod record;
pub mod scope;
pub mod secret;

pub use id::*;
pub use record::*;
pub use scope::*;
pub use secret::*;
