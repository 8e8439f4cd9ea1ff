//! Bearer credentials supplied by the authentication system.

// self
use crate::{_prelude::*, token::TokenSecret};

/// Boxed future returned by [`CredentialProvider::current_credential`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Option<BearerCredential>> + 'a + Send>>;

/// Source of the signed-in user's bearer credential.
///
/// Implementations return `None` when no user is signed in. The fetcher treats that as an
/// unauthenticated state and never contacts the token endpoint.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Resolves the credential that should authorize the next token request.
	fn current_credential(&self) -> CredentialFuture<'_>;
}

/// Redacted bearer credential (for example an identity token).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerCredential(TokenSecret);
impl BearerCredential {
	/// Wraps a raw credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(TokenSecret::new(value))
	}

	/// Returns the raw credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}
impl Display for BearerCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
