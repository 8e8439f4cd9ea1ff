//! Process-wide token cache with single-flight acquisition.
//!
//! [`TokenStore`] is the single source of truth for the current CSRF token. It moves
//! through `Empty -> Fetching -> Cached -> Empty`:
//!
//! - A caller that finds an unexpired cached token gets it without suspending on the
//!   network.
//! - A caller that finds the store empty or fetching joins the one outstanding
//!   acquisition. The pending acquisition itself (a shared future) is the synchronization
//!   point, so N concurrent callers cause exactly one fetch and observe the same outcome.
//! - Every clear or forced refresh bumps an epoch. An acquisition settles into the cache
//!   only if the epoch it started under is still current, so a result obtained for a
//!   previous session is discarded instead of cached.
//! - Failures are never cached; the store returns to `Empty` and the error reaches every
//!   joined caller.

pub mod global;

mod metrics;

pub use metrics::StoreMetrics;

// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	fetcher::TokenFetcher,
	obs::{self, OpOutcome, OpSpan, TokenOp},
	token::CsrfToken,
};

type Acquisition = Shared<BoxFuture<'static, Result<CsrfToken>>>;

/// Observable state of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No token is cached and no acquisition is pending.
	Empty,
	/// An acquisition is pending.
	Fetching,
	/// A token is cached until `expires_at`.
	Cached {
		/// Expiry of the cached token.
		expires_at: OffsetDateTime,
	},
}

#[derive(Default)]
struct StoreState {
	epoch: u64,
	cached: Option<CsrfToken>,
	in_flight: Option<Acquisition>,
}

/// Single-flight cache for the current CSRF token.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct TokenStore {
	fetcher: Arc<dyn TokenFetcher>,
	state: Arc<Mutex<StoreState>>,
	metrics: Arc<StoreMetrics>,
}
impl TokenStore {
	/// Creates an empty store that acquires tokens through `fetcher`.
	pub fn new(fetcher: Arc<dyn TokenFetcher>) -> Self {
		Self { fetcher, state: Default::default(), metrics: Default::default() }
	}

	/// Returns a valid token, fetching one when the cache is empty or expired.
	pub async fn get_token(&self) -> Result<CsrfToken> {
		const OP: TokenOp = TokenOp::Acquire;

		let acquisition = {
			let _span = OpSpan::new(OP, "get_token").entered();
			let mut state = self.state.lock();
			let now = OffsetDateTime::now_utc();

			match state.cached.as_ref() {
				Some(token) if !token.is_expired_at(now) => {
					self.metrics.record_cache_hit();
					obs::record_op_outcome(OP, OpOutcome::Success);

					return Ok(token.clone());
				},
				Some(_) => {
					tracing::debug!("Cached CSRF token expired; acquiring a new one.");

					state.cached = None;
				},
				None => (),
			}

			match state.in_flight.as_ref() {
				Some(pending) => {
					tracing::debug!("Joining the pending CSRF token acquisition.");
					self.metrics.record_join();

					pending.clone()
				},
				None => self.begin_acquisition(&mut state),
			}
		};

		Self::settle_outcome(OP, acquisition.await)
	}

	/// Discards the cached token and any pending acquisition, then fetches a fresh token.
	///
	/// Callers already waiting on the discarded acquisition still receive its outcome; it
	/// is simply not cached.
	pub async fn refresh_token(&self) -> Result<CsrfToken> {
		self.begin_refresh().await
	}

	/// Invalidates the cache and registers a new acquisition before returning.
	///
	/// The returned future only awaits that acquisition, so a
	/// [`clear_token`](Self::clear_token) issued before it is first polled still discards
	/// its result.
	pub fn begin_refresh(&self) -> impl Future<Output = Result<CsrfToken>> + Send + 'static {
		const OP: TokenOp = TokenOp::Refresh;

		let acquisition = {
			let _span = OpSpan::new(OP, "refresh_token").entered();
			let mut state = self.state.lock();

			Self::invalidate(&mut state);

			self.begin_acquisition(&mut state)
		};

		async move { Self::settle_outcome(OP, acquisition.await) }
	}

	/// Drops the cached token without fetching.
	///
	/// A pending acquisition keeps running for the callers already waiting on it, but its
	/// result will not be cached.
	pub fn clear_token(&self) {
		let _span = OpSpan::new(TokenOp::Clear, "clear_token").entered();
		let mut state = self.state.lock();

		Self::invalidate(&mut state);
		obs::record_op_outcome(TokenOp::Clear, OpOutcome::Success);
		tracing::debug!("Cleared the CSRF token.");
	}

	/// Reports the current state without side effects.
	///
	/// A cached token past its expiry still reports `Cached`; the next
	/// [`get_token`](Self::get_token) replaces it.
	pub fn state(&self) -> TokenState {
		let state = self.state.lock();

		match (&state.cached, &state.in_flight) {
			(Some(token), _) => TokenState::Cached { expires_at: token.expires_at() },
			(None, Some(_)) => TokenState::Fetching,
			(None, None) => TokenState::Empty,
		}
	}

	/// Counters describing the store's activity.
	pub fn metrics(&self) -> &StoreMetrics {
		&self.metrics
	}

	fn invalidate(state: &mut StoreState) {
		state.epoch = state.epoch.wrapping_add(1);
		state.cached = None;
		state.in_flight = None;
	}

	fn begin_acquisition(&self, state: &mut StoreState) -> Acquisition {
		let epoch = state.epoch;
		let fetcher = self.fetcher.clone();
		let shared_state = self.state.clone();
		let metrics = self.metrics.clone();
		let acquisition = async move {
			metrics.record_fetch();

			let result = fetcher.fetch().await;
			let mut state = shared_state.lock();

			if state.epoch == epoch {
				state.in_flight = None;

				match &result {
					Ok(token) => state.cached = Some(token.clone()),
					Err(_) => metrics.record_failure(),
				}
			} else {
				tracing::debug!("Discarding a CSRF token acquired before the last clear.");
			}

			result
		}
		.boxed()
		.shared();

		tracing::debug!("Starting a CSRF token acquisition.");

		state.in_flight = Some(acquisition.clone());

		acquisition
	}

	fn settle_outcome(op: TokenOp, result: Result<CsrfToken>) -> Result<CsrfToken> {
		match &result {
			Ok(_) => obs::record_op_outcome(op, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(op, OpOutcome::Failure),
		}

		result
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore").field("state", &self.state()).finish()
	}
}
