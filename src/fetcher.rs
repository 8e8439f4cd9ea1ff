//! Token fetcher: one round trip to the token-issuing endpoint per invocation.

mod response;

// crates.io
use reqwest::header::{ACCEPT, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::CredentialProvider,
	config::CsrfConfig,
	error::TransportError,
	http::ReqwestHttpClient,
	token::CsrfToken,
};

/// Boxed future returned by [`TokenFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<CsrfToken>> + 'a + Send>>;

/// Performs a single token acquisition against the issuing endpoint.
///
/// The store invokes a fetcher at most once per acquisition and never retries on its
/// behalf. Implementations must not cache; caching is the store's job.
pub trait TokenFetcher
where
	Self: Send + Sync,
{
	/// Requests a fresh token.
	fn fetch(&self) -> FetchFuture<'_>;
}

/// Reqwest-backed fetcher that authenticates with the collaborator's bearer credential.
///
/// The request is a `GET` carrying `Authorization: Bearer <credential>`. The endpoint is
/// expected to answer `{ "token": "...", "expiresAt": ... }` and to set the correlated
/// cookie, which lands in the client's jar.
pub struct HttpTokenFetcher {
	http: ReqwestHttpClient,
	endpoint: Url,
	fallback_ttl: Duration,
	credentials: Arc<dyn CredentialProvider>,
}
impl HttpTokenFetcher {
	/// Creates a fetcher for the configured endpoint.
	pub fn new(
		http: ReqwestHttpClient,
		config: &CsrfConfig,
		credentials: Arc<dyn CredentialProvider>,
	) -> Self {
		Self {
			http,
			endpoint: config.token_endpoint.clone(),
			fallback_ttl: config.fallback_ttl,
			credentials,
		}
	}

	async fn fetch_once(&self) -> Result<CsrfToken> {
		let credential =
			self.credentials.current_credential().await.ok_or(Error::Unauthenticated)?;

		tracing::debug!(endpoint = %self.endpoint, "Requesting a CSRF token.");

		let response = self
			.http
			.get(self.endpoint.clone())
			.bearer_auth(credential.expose())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.send()
			.await
			.map_err(TransportError::token_endpoint)?;
		let status = response.status();
		let body = response.bytes().await.map_err(TransportError::token_endpoint)?;

		if !status.is_success() {
			return Err(Error::ServerRejection {
				status: status.as_u16(),
				message: response::rejection_message(status.as_u16(), &body),
			});
		}

		response::parse_token(&body, OffsetDateTime::now_utc(), self.fallback_ttl)
	}
}
impl TokenFetcher for HttpTokenFetcher {
	fn fetch(&self) -> FetchFuture<'_> {
		Box::pin(self.fetch_once())
	}
}
impl Debug for HttpTokenFetcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenFetcher")
			.field("endpoint", &self.endpoint)
			.field("fallback_ttl", &self.fallback_ttl)
			.finish()
	}
}
