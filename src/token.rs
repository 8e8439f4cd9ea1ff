//! CSRF token model: the redacted secret and the expiring token record.

pub mod record;
pub mod secret;

pub use record::*;
pub use secret::*;
