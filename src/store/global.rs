//! Process-wide accessor for the shared [`TokenStore`].
//!
//! Call sites that cannot thread a store reference through their call graph resolve it
//! here. Components also accept an explicit `Arc<TokenStore>`, which is what tests
//! should inject instead of touching the global slot.

// crates.io
use parking_lot::const_rwlock;
// self
use crate::{_prelude::*, error::ConfigError, store::TokenStore};

static GLOBAL_STORE: RwLock<Option<Arc<TokenStore>>> = const_rwlock(None);

/// Installs `store` as the process-wide instance, returning the previous one.
pub fn install(store: Arc<TokenStore>) -> Option<Arc<TokenStore>> {
	GLOBAL_STORE.write().replace(store)
}

/// Returns the process-wide store.
pub fn current() -> Result<Arc<TokenStore>> {
	GLOBAL_STORE.read().clone().ok_or_else(|| ConfigError::GlobalStoreMissing.into())
}

/// Removes the process-wide store, returning it.
pub fn uninstall() -> Option<Arc<TokenStore>> {
	GLOBAL_STORE.write().take()
}
