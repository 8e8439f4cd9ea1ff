//! Contracts with the authentication collaborator: bearer credentials and session events.

pub mod credential;
pub mod event;
pub mod session;

pub use credential::*;
pub use event::*;
pub use session::*;
