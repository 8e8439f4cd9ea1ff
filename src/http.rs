//! Transport primitives shared by the token fetcher and protected calls.
//!
//! The fetcher and the [`ProtectedClient`](crate::augment::ProtectedClient) must run on
//! the same cookie jar: the token endpoint sets the correlated cookie secret as a side
//! effect, and that cookie has to travel with every protected mutation. The jar is owned
//! by [`ReqwestHttpClient`] and never inspected by the broker itself.

// std
use std::ops::Deref;
// crates.io
use reqwest::{cookie::Jar, redirect::Policy};
// self
use crate::{_prelude::*, error::ConfigError};

/// Thin wrapper around [`ReqwestClient`] bound to a shared cookie jar.
///
/// Redirects are not followed so a token response is always read from the configured
/// endpoint rather than from wherever it delegates to.
#[derive(Clone)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	cookies: Arc<Jar>,
}
impl ReqwestHttpClient {
	/// Builds a client that stores and replays cookies through `cookies`.
	pub fn with_cookie_jar(cookies: Arc<Jar>, timeout: Duration) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(timeout)
			.map_err(ConfigError::http_client_build)?;
		let client = ReqwestClient::builder()
			.cookie_provider(cookies.clone())
			.redirect(Policy::none())
			.timeout(timeout)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self { client, cookies })
	}

	/// Wraps an existing client. `cookies` must be the jar the client was built with.
	pub fn with_client(client: ReqwestClient, cookies: Arc<Jar>) -> Self {
		Self { client, cookies }
	}

	/// Cookie jar shared with the token endpoint exchange.
	pub fn cookie_jar(&self) -> &Arc<Jar> {
		&self.cookies
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}
