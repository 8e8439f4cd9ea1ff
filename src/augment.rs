//! Request augmentation: attach the CSRF token and the transport cookie to protected calls.
//!
//! Augmentation fails open. When no token can be obtained the request goes out unchanged
//! and a warning is logged; the server's double-submit check stays the authority that
//! rejects unprotected mutations.

// crates.io
use reqwest::{
	Method, Request, RequestBuilder, Response,
	cookie::{CookieStore, Jar},
	header::{COOKIE, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	config::CsrfConfig,
	error::TransportError,
	http::ReqwestHttpClient,
	obs::{self, OpOutcome, OpSpan, TokenOp},
	store::{TokenStore, global},
};

/// Attaches the current token to outgoing protected requests.
#[derive(Clone)]
pub struct RequestAugmenter {
	store: Arc<TokenStore>,
	config: Arc<CsrfConfig>,
	cookies: Option<Arc<Jar>>,
}
impl RequestAugmenter {
	/// Creates an augmenter backed by an explicit store.
	pub fn new(store: Arc<TokenStore>, config: Arc<CsrfConfig>) -> Self {
		Self { store, config, cookies: None }
	}

	/// Creates an augmenter backed by the process-wide store.
	pub fn from_global(config: Arc<CsrfConfig>) -> Result<Self> {
		Ok(Self::new(global::current()?, config))
	}

	/// Copies cookies from `jar` onto protected requests that do not already carry any.
	///
	/// Needed when requests are sent through a client that does not share the token
	/// endpoint's jar.
	pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
		self.cookies = Some(jar);

		self
	}

	/// Returns `request` with the token header and transport cookie attached.
	///
	/// Never fails: if the token cannot be obtained, the original request is returned
	/// untouched and a warning is emitted. Requests to origins outside the protected set
	/// are also returned untouched so the token never leaves its origin.
	pub async fn augment(&self, mut request: Request) -> Request {
		const OP: TokenOp = TokenOp::Augment;

		let span = OpSpan::new(OP, "augment");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		if !self.config.is_protected(request.url()) {
			tracing::debug!(
				url = %request.url(),
				"Request targets an unprotected origin; leaving it unmodified."
			);

			return request;
		}

		let token = match span.instrument(self.store.get_token()).await {
			Ok(token) => token,
			Err(e) => {
				tracing::warn!(
					method = %request.method(),
					url = %request.url(),
					error = %e,
					"CSRF token unavailable; sending the request without it."
				);
				obs::record_op_outcome(OP, OpOutcome::Degraded);

				return request;
			},
		};
		let Ok(mut value) = HeaderValue::from_str(token.value().expose()) else {
			tracing::warn!(
				url = %request.url(),
				"CSRF token is not a valid header value; sending the request without it."
			);
			obs::record_op_outcome(OP, OpOutcome::Degraded);

			return request;
		};

		value.set_sensitive(true);
		request.headers_mut().insert(self.header_name().clone(), value);
		self.attach_cookies(&mut request);
		obs::record_op_outcome(OP, OpOutcome::Success);

		request
	}

	/// Header the token is written to.
	pub fn header_name(&self) -> &HeaderName {
		&self.config.header_name
	}

	/// Store backing this augmenter.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	fn attach_cookies(&self, request: &mut Request) {
		let Some(jar) = self.cookies.as_ref() else {
			return;
		};

		if request.headers().contains_key(COOKIE) {
			return;
		}
		if let Some(cookies) = jar.cookies(request.url()) {
			request.headers_mut().insert(COOKIE, cookies);
		}
	}
}
impl Debug for RequestAugmenter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestAugmenter")
			.field("header_name", self.header_name())
			.field("protected_origins", &self.config.protected_origins)
			.field("cookie_jar", &self.cookies.is_some())
			.finish()
	}
}

/// HTTP client for protected mutations: augments, sends, and reacts to token rejections.
///
/// The client shares the token endpoint's cookie jar, so the correlated cookie travels
/// with every request to the protected origin. Rejected calls are not retried; the caller
/// decides whether to try again once the refreshed token is in place.
#[derive(Clone, Debug)]
pub struct ProtectedClient {
	http: ReqwestHttpClient,
	augmenter: RequestAugmenter,
}
impl ProtectedClient {
	/// Creates a client sending through `http` with tokens from `augmenter`.
	pub fn new(http: ReqwestHttpClient, augmenter: RequestAugmenter) -> Self {
		Self { http, augmenter }
	}

	/// Starts building a request on the shared client.
	pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
		self.http.request(method, url)
	}

	/// Builds `builder` and executes it through [`execute`](Self::execute).
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let request = builder.build().map_err(TransportError::protected_endpoint)?;

		self.execute(request).await
	}

	/// Augments and sends `request`.
	///
	/// When the response status is a configured rejection status, the token is refreshed
	/// best-effort before the response is handed back.
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let request = self.augmenter.augment(request).await;
		let response =
			self.http.execute(request).await.map_err(TransportError::protected_endpoint)?;
		let status = response.status().as_u16();

		if self.augmenter.config.is_rejection(status)
			&& self.augmenter.config.is_protected(response.url())
		{
			tracing::warn!(
				status,
				url = %response.url(),
				"Protected call was rejected; refreshing the CSRF token."
			);

			if let Err(e) = self.augmenter.store.refresh_token().await {
				tracing::warn!(error = %e, "CSRF token refresh after rejection failed.");
			}
		}

		Ok(response)
	}

	/// Augmenter used by this client.
	pub fn augmenter(&self) -> &RequestAugmenter {
		&self.augmenter
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::CONTENT_TYPE;
	// self
	use super::*;
	use crate::{
		fetcher::{FetchFuture, TokenFetcher},
		token::CsrfToken,
	};

	struct FixedFetcher(Option<&'static str>);
	impl TokenFetcher for FixedFetcher {
		fn fetch(&self) -> FetchFuture<'_> {
			let outcome = match self.0 {
				Some(value) =>
					Ok(CsrfToken::new(value, OffsetDateTime::now_utc() + Duration::hours(1))),
				None => Err(Error::Unauthenticated),
			};

			Box::pin(async move { outcome })
		}
	}

	fn config() -> Arc<CsrfConfig> {
		let endpoint =
			Url::parse("https://app.example.com/api/csrf").expect("Fixture URL should parse.");

		Arc::new(CsrfConfig::builder(endpoint).build().expect("Fixture config should validate."))
	}

	fn request(url: &str) -> Request {
		let mut request =
			Request::new(Method::POST, Url::parse(url).expect("Fixture URL should parse."));

		request.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		*request.body_mut() = Some("{\"sku\":\"A-1\"}".into());

		request
	}

	fn augmenter(token: Option<&'static str>) -> RequestAugmenter {
		RequestAugmenter::new(Arc::new(TokenStore::new(Arc::new(FixedFetcher(token)))), config())
	}

	#[tokio::test]
	async fn token_header_is_attached_to_protected_origins() {
		let augmented = augmenter(Some("abc123"))
			.augment(request("https://app.example.com/api/checkout"))
			.await;
		let header =
			augmented.headers().get("x-csrf-token").expect("Token header should be set.");

		assert_eq!(header, "abc123");
		assert!(header.is_sensitive());
		assert_eq!(
			augmented.headers().get(CONTENT_TYPE).expect("Content type should survive."),
			"application/json",
		);
	}

	#[tokio::test]
	async fn foreign_origins_never_receive_the_token() {
		let augmenter = augmenter(Some("abc123"));
		let augmented = augmenter.augment(request("https://tracker.example.net/collect")).await;

		assert!(augmented.headers().get("x-csrf-token").is_none());
		assert_eq!(augmenter.store().metrics().fetches(), 0);
	}

	#[tokio::test]
	async fn acquisition_failure_fails_open() {
		let augmented =
			augmenter(None).augment(request("https://app.example.com/api/profile")).await;

		assert!(augmented.headers().get("x-csrf-token").is_none());
		assert_eq!(augmented.headers().len(), 1);
		assert_eq!(
			augmented.body().and_then(|body| body.as_bytes()),
			Some(&b"{\"sku\":\"A-1\"}"[..]),
		);
	}

	#[tokio::test]
	async fn jar_cookies_ride_along_unless_already_present() {
		let jar = Arc::new(Jar::default());
		let origin = Url::parse("https://app.example.com/").expect("Fixture URL should parse.");

		jar.add_cookie_str("csrf_secret=s3cr3t; Path=/", &origin);

		let augmenter = augmenter(Some("abc123")).with_cookie_jar(jar);
		let augmented = augmenter.augment(request("https://app.example.com/api/save")).await;

		assert_eq!(
			augmented.headers().get(COOKIE).expect("Jar cookie should be attached."),
			"csrf_secret=s3cr3t",
		);

		let mut explicit = request("https://app.example.com/api/save");

		explicit.headers_mut().insert(COOKIE, HeaderValue::from_static("session=keep"));

		let augmented = augmenter.augment(explicit).await;

		assert_eq!(augmented.headers().get(COOKIE).expect("Cookie should remain."), "session=keep");
	}
}
