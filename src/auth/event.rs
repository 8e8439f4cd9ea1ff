//! Authentication transitions observed by the lifecycle coordinator.

// self
use crate::_prelude::*;

/// Session transitions emitted by the authentication collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthEvent {
	/// A user signed in.
	SignedIn,
	/// The user signed out; any token tied to the old session must go.
	SignedOut,
	/// The bearer credential was rotated for the same user.
	CredentialRefreshed,
}
impl AuthEvent {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthEvent::SignedIn => "signed_in",
			AuthEvent::SignedOut => "signed_out",
			AuthEvent::CredentialRefreshed => "credential_refreshed",
		}
	}
}
impl Display for AuthEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
