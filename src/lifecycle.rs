//! Keeps the token store aligned with the user's session and with elapsed time.
//!
//! Rules applied by the coordinator:
//! - sign-out clears the token immediately;
//! - sign-in and credential refresh fetch a token for the new session;
//! - a fixed timer, shorter than the token TTL, refreshes regardless of traffic.
//!
//! Every coordinator-triggered refresh is best-effort. Failures are logged and counted,
//! never propagated.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	sync::broadcast::{self, error::RecvError},
	task::{JoinHandle, JoinSet},
	time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::AuthEvent,
	config::CsrfConfig,
	obs::{self, OpOutcome, OpSpan, TokenOp},
	store::TokenStore,
	token::CsrfToken,
};

/// Drives clears and refreshes of a [`TokenStore`] from auth events and a timer.
#[derive(Clone, Debug)]
pub struct LifecycleCoordinator {
	store: Arc<TokenStore>,
	refresh_interval: StdDuration,
	prefetch_on_start: bool,
}
impl LifecycleCoordinator {
	/// Creates a coordinator using the configured refresh interval.
	pub fn new(store: Arc<TokenStore>, config: &CsrfConfig) -> Self {
		Self {
			store,
			refresh_interval: config.refresh_interval.unsigned_abs(),
			prefetch_on_start: true,
		}
	}

	/// Controls whether a token is fetched as soon as the coordinator starts.
	pub fn with_prefetch_on_start(mut self, prefetch: bool) -> Self {
		self.prefetch_on_start = prefetch;

		self
	}

	/// Interval between timer-driven refreshes.
	pub fn refresh_interval(&self) -> StdDuration {
		self.refresh_interval
	}

	/// Applies a single auth event, waiting for any refresh it triggers.
	pub async fn handle_event(&self, event: AuthEvent) {
		match event {
			AuthEvent::SignedOut => self.clear(event.as_str()),
			AuthEvent::SignedIn | AuthEvent::CredentialRefreshed =>
				refresh(self.store.begin_refresh(), event.as_str()).await,
		}
	}

	/// Starts the background task. Must be called inside a Tokio runtime.
	///
	/// Dropping the returned handle detaches the task; call
	/// [`LifecycleHandle::shutdown`] to stop it.
	pub fn spawn(self, events: broadcast::Receiver<AuthEvent>) -> LifecycleHandle {
		let cancel = CancellationToken::new();
		let join = tokio::spawn(self.run(events, cancel.clone()));

		LifecycleHandle { cancel, join }
	}

	async fn run(self, mut events: broadcast::Receiver<AuthEvent>, cancel: CancellationToken) {
		let period = self.refresh_interval;
		let mut ticker = time::interval_at(Instant::now() + period, period);
		let mut refreshes = JoinSet::new();
		let mut events_open = true;

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		tracing::info!(
			refresh_interval_secs = period.as_secs(),
			"CSRF lifecycle coordinator started."
		);

		if self.prefetch_on_start {
			refreshes.spawn(refresh(self.store.begin_refresh(), "start"));
		}

		loop {
			tokio::select! {
				biased;

				_ = cancel.cancelled() => break,
				received = events.recv(), if events_open => match received {
					Ok(AuthEvent::SignedOut) => self.clear(AuthEvent::SignedOut.as_str()),
					Ok(event) => {
						refreshes.spawn(refresh(self.store.begin_refresh(), event.as_str()));
					},
					Err(RecvError::Lagged(missed)) => {
						tracing::warn!(missed, "Auth events were missed; clearing the CSRF token.");

						self.clear("lagged");
					},
					Err(RecvError::Closed) => {
						tracing::info!(
							"Auth event stream closed; keeping the refresh timer running."
						);

						events_open = false;
					},
				},
				_ = ticker.tick() => {
					refreshes.spawn(refresh(self.store.begin_refresh(), "interval"));
				},
				Some(joined) = refreshes.join_next(), if !refreshes.is_empty() => {
					if let Err(e) = joined {
						tracing::warn!(error = %e, "CSRF refresh task ended abnormally.");
					}
				},
			}
		}

		refreshes.shutdown().await;
		tracing::info!("CSRF lifecycle coordinator stopped.");
	}

	fn clear(&self, reason: &'static str) {
		let _span = OpSpan::new(TokenOp::Lifecycle, reason).entered();

		self.store.clear_token();
		obs::record_op_outcome(TokenOp::Lifecycle, OpOutcome::Success);
		tracing::info!(reason, "CSRF token cleared.");
	}
}

/// Control handle for a running [`LifecycleCoordinator`].
#[derive(Debug)]
pub struct LifecycleHandle {
	cancel: CancellationToken,
	join: JoinHandle<()>,
}
impl LifecycleHandle {
	/// Token that stops the coordinator when cancelled.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Returns `true` once the background task has exited.
	pub fn is_finished(&self) -> bool {
		self.join.is_finished()
	}

	/// Stops the coordinator, aborts refreshes still running, and waits for the task.
	pub async fn shutdown(self) {
		self.cancel.cancel();

		if let Err(e) = self.join.await {
			tracing::warn!(error = %e, "CSRF lifecycle coordinator ended abnormally.");
		}
	}
}

/// Awaits an acquisition already registered with the store.
///
/// Callers must obtain `acquisition` from [`TokenStore::begin_refresh`] before spawning, so
/// a sign-out handled in the meantime still discards the result.
async fn refresh<F>(acquisition: F, reason: &'static str)
where
	F: Future<Output = Result<CsrfToken>>,
{
	const OP: TokenOp = TokenOp::Lifecycle;

	obs::record_op_outcome(OP, OpOutcome::Attempt);

	match OpSpan::new(OP, reason).instrument(acquisition).await {
		Ok(token) => {
			let remaining = token.remaining_at(OffsetDateTime::now_utc());

			obs::record_op_outcome(OP, OpOutcome::Success);
			tracing::info!(
				reason,
				remaining_secs = remaining.whole_seconds(),
				"CSRF token refreshed."
			);
		},
		Err(e) => {
			obs::record_op_outcome(OP, OpOutcome::Failure);
			tracing::warn!(reason, error = %e, "Background CSRF token refresh failed.");
		},
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		fetcher::{FetchFuture, TokenFetcher},
		store::TokenState,
	};

	#[derive(Default)]
	struct CountingFetcher {
		calls: AtomicUsize,
		failing: bool,
	}
	impl TokenFetcher for CountingFetcher {
		fn fetch(&self) -> FetchFuture<'_> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			let failing = self.failing;

			Box::pin(async move {
				if failing {
					Err(Error::ServerRejection { status: 503, message: "maintenance".into() })
				} else {
					Ok(CsrfToken::new(
						format!("token-{call}"),
						OffsetDateTime::now_utc() + Duration::hours(24),
					))
				}
			})
		}
	}

	fn coordinator(fetcher: Arc<CountingFetcher>) -> (Arc<TokenStore>, LifecycleCoordinator) {
		let endpoint =
			Url::parse("https://app.example.com/api/csrf").expect("Fixture URL should parse.");
		let config =
			CsrfConfig::builder(endpoint).build().expect("Fixture config should validate.");
		let store = Arc::new(TokenStore::new(fetcher));
		let coordinator =
			LifecycleCoordinator::new(store.clone(), &config).with_prefetch_on_start(false);

		(store, coordinator)
	}

	async fn settle() {
		time::sleep(StdDuration::from_millis(10)).await;
	}

	#[tokio::test]
	async fn sign_out_clears_and_sign_in_refreshes() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (store, coordinator) = coordinator(fetcher.clone());

		store.get_token().await.expect("Initial token should be fetched.");
		coordinator.handle_event(AuthEvent::SignedOut).await;

		assert_eq!(store.state(), TokenState::Empty);

		coordinator.handle_event(AuthEvent::SignedIn).await;

		assert!(matches!(store.state(), TokenState::Cached { .. }));
		assert_eq!(
			store.get_token().await.expect("Refreshed token should be cached.").value().expose(),
			"token-2",
		);
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn refresh_failures_are_absorbed() {
		let fetcher = Arc::new(CountingFetcher { failing: true, ..Default::default() });
		let (store, coordinator) = coordinator(fetcher.clone());

		coordinator.handle_event(AuthEvent::CredentialRefreshed).await;

		assert_eq!(store.state(), TokenState::Empty);
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn timer_refreshes_on_every_interval() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (_store, coordinator) = coordinator(fetcher.clone());
		let period = coordinator.refresh_interval();
		let (_events_tx, events_rx) = broadcast::channel(4);
		let handle = coordinator.spawn(events_rx);

		time::sleep(period - StdDuration::from_secs(1)).await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

		time::sleep(StdDuration::from_secs(2)).await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

		time::sleep(period).await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

		handle.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn events_drive_the_spawned_coordinator() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (store, coordinator) = coordinator(fetcher.clone());
		let (events_tx, events_rx) = broadcast::channel(4);
		let handle = coordinator.with_prefetch_on_start(true).spawn(events_rx);

		settle().await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
		assert!(matches!(store.state(), TokenState::Cached { .. }));

		events_tx.send(AuthEvent::SignedOut).expect("Coordinator should be subscribed.");
		settle().await;

		assert_eq!(store.state(), TokenState::Empty);

		events_tx.send(AuthEvent::SignedIn).expect("Coordinator should be subscribed.");
		settle().await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
		assert!(matches!(store.state(), TokenState::Cached { .. }));

		handle.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn sign_out_right_after_sign_in_leaves_no_token() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (store, coordinator) = coordinator(fetcher.clone());
		let (events_tx, events_rx) = broadcast::channel(4);

		events_tx.send(AuthEvent::SignedIn).expect("Receiver should be open.");
		events_tx.send(AuthEvent::SignedOut).expect("Receiver should be open.");

		let handle = coordinator.spawn(events_rx);

		settle().await;

		assert_eq!(store.state(), TokenState::Empty);

		handle.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn closed_event_stream_keeps_the_timer_running() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (_store, coordinator) = coordinator(fetcher.clone());
		let period = coordinator.refresh_interval();
		let (events_tx, events_rx) = broadcast::channel(4);
		let handle = coordinator.spawn(events_rx);

		drop(events_tx);
		time::sleep(period + StdDuration::from_secs(1)).await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
		assert!(!handle.is_finished());

		handle.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn shutdown_stops_timer_refreshes() {
		let fetcher = Arc::new(CountingFetcher::default());
		let (_store, coordinator) = coordinator(fetcher.clone());
		let period = coordinator.refresh_interval();
		let (_events_tx, events_rx) = broadcast::channel(4);
		let handle = coordinator.spawn(events_rx);

		handle.shutdown().await;
		time::sleep(period * 3).await;

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
	}
}
