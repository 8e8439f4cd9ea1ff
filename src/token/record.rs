//! The anti-forgery token held by the store.

// self
use crate::{_prelude::*, token::secret::TokenSecret};

/// Short-lived anti-forgery token correlated with a script-inaccessible cookie secret.
///
/// Tokens live only in process memory; nothing in the crate serializes them to durable
/// storage, so a restart always begins without a token.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken {
	value: TokenSecret,
	expires_at: OffsetDateTime,
}
impl CsrfToken {
	/// Creates a token from its opaque value and absolute expiry.
	pub fn new(value: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { value: TokenSecret::new(value), expires_at }
	}

	/// Opaque token value, meaningful only to the issuing server.
	pub fn value(&self) -> &TokenSecret {
		&self.value
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining lifetime at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CsrfToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CsrfToken")
			.field("value", &self.value)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
