//! One-stop wiring of the store, fetcher, augmenter, payload builder, and coordinator.

// crates.io
use reqwest::cookie::Jar;
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	augment::{ProtectedClient, RequestAugmenter},
	auth::{AuthEvent, CredentialProvider},
	config::CsrfConfig,
	fetcher::{HttpTokenFetcher, TokenFetcher},
	http::ReqwestHttpClient,
	lifecycle::{LifecycleCoordinator, LifecycleHandle},
	payload::PayloadBuilder,
	store::{TokenStore, global},
};

/// Fully wired CSRF protection for one application origin.
///
/// The broker owns a single cookie jar shared by the token fetcher and the
/// [`ProtectedClient`], so the cookie set by the token endpoint is replayed on every
/// protected call.
#[derive(Clone, Debug)]
pub struct CsrfBroker {
	config: Arc<CsrfConfig>,
	http: ReqwestHttpClient,
	store: Arc<TokenStore>,
	augmenter: RequestAugmenter,
}
impl CsrfBroker {
	/// Builds a broker that fetches tokens over HTTP with `credentials`.
	pub fn new(config: CsrfConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
		let http =
			ReqwestHttpClient::with_cookie_jar(Arc::new(Jar::default()), config.request_timeout)?;
		let fetcher = HttpTokenFetcher::new(http.clone(), &config, credentials);

		Ok(Self::assemble(config, http, Arc::new(fetcher)))
	}

	/// Builds a broker around a custom fetcher. `http` is used for protected calls and
	/// its jar for cookie carriage.
	pub fn with_fetcher(
		config: CsrfConfig,
		http: ReqwestHttpClient,
		fetcher: Arc<dyn TokenFetcher>,
	) -> Self {
		Self::assemble(config, http, fetcher)
	}

	fn assemble(
		config: CsrfConfig,
		http: ReqwestHttpClient,
		fetcher: Arc<dyn TokenFetcher>,
	) -> Self {
		let config = Arc::new(config);
		let store = Arc::new(TokenStore::new(fetcher));
		let augmenter = RequestAugmenter::new(store.clone(), config.clone())
			.with_cookie_jar(http.cookie_jar().clone());

		tracing::debug!(
			endpoint = %config.token_endpoint,
			protected_origins = config.protected_origins.len(),
			"CSRF broker assembled."
		);

		Self { config, http, store, augmenter }
	}

	/// Validated configuration.
	pub fn config(&self) -> &Arc<CsrfConfig> {
		&self.config
	}

	/// Shared token store.
	pub fn store(&self) -> &Arc<TokenStore> {
		&self.store
	}

	/// Augmenter bound to this broker's store and cookie jar.
	pub fn augmenter(&self) -> &RequestAugmenter {
		&self.augmenter
	}

	/// Client for protected calls, sharing the token endpoint's cookie jar.
	pub fn protected_client(&self) -> ProtectedClient {
		ProtectedClient::new(self.http.clone(), self.augmenter.clone())
	}

	/// Payload builder bound to this broker's store.
	pub fn payload_builder(&self) -> PayloadBuilder {
		PayloadBuilder::new(self.store.clone(), &self.config)
	}

	/// Coordinator for this broker's store, not yet started.
	pub fn lifecycle(&self) -> LifecycleCoordinator {
		LifecycleCoordinator::new(self.store.clone(), &self.config)
	}

	/// Starts the lifecycle coordinator on `events`. Must be called inside a Tokio runtime.
	pub fn start_lifecycle(&self, events: broadcast::Receiver<AuthEvent>) -> LifecycleHandle {
		self.lifecycle().spawn(events)
	}

	/// Publishes this broker's store as the process-wide instance, returning the previous one.
	pub fn install_global(&self) -> Option<Arc<TokenStore>> {
		global::install(self.store.clone())
	}
}
