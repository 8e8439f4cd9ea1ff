//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use csrf_broker::{
	auth::{AuthSession, BearerCredential},
	broker::CsrfBroker,
	config::CsrfConfig,
	url::Url,
};
use httpmock::MockServer;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

pub const TOKEN_PATH: &str = "/api/csrf";
pub const ID_TOKEN: &str = "id-token-1";

pub fn url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

pub fn config(server: &MockServer) -> CsrfConfig {
	CsrfConfig::builder(url(server, TOKEN_PATH))
		.build()
		.expect("Loopback token endpoint should pass validation.")
}

pub fn signed_in_session() -> Arc<AuthSession> {
	let session = Arc::new(AuthSession::new());

	session.sign_in(BearerCredential::new(ID_TOKEN));

	session
}

pub fn broker(server: &MockServer, session: Arc<AuthSession>) -> CsrfBroker {
	CsrfBroker::new(config(server), session).expect("Broker should build for the mock server.")
}

/// Unix epoch milliseconds `offset` from now.
pub fn epoch_millis_from_now(offset: Duration) -> i64 {
	let at = OffsetDateTime::now_utc() + offset;

	(at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn token_body(token: &str, expires_in: Duration) -> Value {
	json!({ "token": token, "expiresAt": epoch_millis_from_now(expires_in) })
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
	for _ in 0..200 {
		if condition() {
			return;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	panic!("Condition should hold within two seconds.");
}
