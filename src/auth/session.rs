//! In-memory session holder that doubles as a [`CredentialProvider`] and event source.

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::{AuthEvent, BearerCredential, CredentialFuture, CredentialProvider},
};

/// Process-local view of the signed-in user's credential.
///
/// Applications that already own an authentication client can forward its state
/// changes into an `AuthSession` and hand the session to the broker.
#[derive(Debug)]
pub struct AuthSession {
	credential: RwLock<Option<BearerCredential>>,
	events: broadcast::Sender<AuthEvent>,
}
impl AuthSession {
	const EVENT_CAPACITY: usize = 16;

	/// Creates a signed-out session.
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);

		Self { credential: RwLock::new(None), events }
	}

	/// Stores a credential for a newly signed-in user and emits [`AuthEvent::SignedIn`].
	pub fn sign_in(&self, credential: BearerCredential) {
		*self.credential.write() = Some(credential);

		self.emit(AuthEvent::SignedIn);
	}

	/// Drops the credential and emits [`AuthEvent::SignedOut`].
	pub fn sign_out(&self) {
		self.credential.write().take();

		self.emit(AuthEvent::SignedOut);
	}

	/// Replaces the credential for the same user and emits
	/// [`AuthEvent::CredentialRefreshed`].
	pub fn refresh_credential(&self, credential: BearerCredential) {
		*self.credential.write() = Some(credential);

		self.emit(AuthEvent::CredentialRefreshed);
	}

	/// Returns `true` while a credential is held.
	pub fn is_signed_in(&self) -> bool {
		self.credential.read().is_some()
	}

	/// Subscribes to future session transitions.
	pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
		self.events.subscribe()
	}

	fn emit(&self, event: AuthEvent) {
		// No subscribers is a normal state before the coordinator starts.
		let _ = self.events.send(event);
	}
}
impl Default for AuthSession {
	fn default() -> Self {
		Self::new()
	}
}
impl CredentialProvider for AuthSession {
	fn current_credential(&self) -> CredentialFuture<'_> {
		let credential = self.credential.read().clone();

		Box::pin(async move { credential })
	}
}
