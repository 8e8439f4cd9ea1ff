mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use csrf_broker::{
	auth::{AuthSession, BearerCredential},
	error::Error,
	store::TokenState,
};
use futures::future;
use httpmock::prelude::*;
use serde_json::json;
use time::{Duration, OffsetDateTime};
// self
use common::*;

#[tokio::test]
async fn happy_path_reuses_the_cached_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(TOKEN_PATH)
				.header("authorization", format!("Bearer {ID_TOKEN}"))
				.header("accept", "application/json");
			then.status(200).json_body(token_body("abc123", Duration::hours(24)));
		})
		.await;
	let broker = broker(&server, signed_in_session());
	let first = broker.store().get_token().await.expect("First acquisition should succeed.");
	let second = broker.store().get_token().await.expect("Cached acquisition should succeed.");

	assert_eq!(first.value().expose(), "abc123");
	assert_eq!(second.value().expose(), "abc123");
	assert_eq!(broker.store().metrics().fetches(), 1);
	assert_eq!(broker.store().metrics().cache_hits(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200)
				.delay(StdDuration::from_millis(50))
				.json_body(token_body("shared", Duration::hours(24)));
		})
		.await;
	let broker = broker(&server, signed_in_session());
	let store = broker.store();
	let results = future::join_all((0..10).map(|_| store.get_token())).await;

	for result in results {
		assert_eq!(
			result.expect("Every joined caller should observe the success.").value().expose(),
			"shared",
		);
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_failure() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(503)
				.delay(StdDuration::from_millis(50))
				.json_body(json!({ "message": "Token service is down" }));
		})
		.await;
	let broker = broker(&server, signed_in_session());
	let store = broker.store();
	let results = future::join_all((0..5).map(|_| store.get_token())).await;

	for result in results {
		let err = result.expect_err("Every joined caller should observe the failure.");

		assert!(matches!(
			err,
			Error::ServerRejection { status: 503, ref message }
				if message == "Token service is down"
		));
	}

	mock.assert_calls_async(1).await;
	assert_eq!(store.state(), TokenState::Empty);
}

#[tokio::test]
async fn expired_cache_triggers_exactly_one_new_fetch() {
	let server = MockServer::start_async().await;
	let mut stale = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(token_body("stale", Duration::seconds(-1)));
		})
		.await;
	let broker = broker(&server, signed_in_session());

	broker.store().get_token().await.expect("Stale acquisition should still succeed.");
	stale.delete_async().await;

	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(token_body("fresh", Duration::hours(24)));
		})
		.await;
	let token = broker.store().get_token().await.expect("Expired cache should be replaced.");

	assert_eq!(token.value().expose(), "fresh");

	fresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn clear_forces_a_fresh_fetch() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(token_body("abc123", Duration::hours(24)));
		})
		.await;
	let broker = broker(&server, signed_in_session());

	broker.store().get_token().await.expect("Initial acquisition should succeed.");
	broker.store().clear_token();

	assert_eq!(broker.store().state(), TokenState::Empty);

	broker.store().get_token().await.expect("Acquisition after clear should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn unauthenticated_acquisition_fails_without_network_and_recovers() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(token_body("abc123", Duration::hours(24)));
		})
		.await;
	let session = Arc::new(AuthSession::new());
	let broker = broker(&server, session.clone());
	let err = broker.store().get_token().await.expect_err("Signed-out acquisition should fail.");

	assert!(matches!(err, Error::Unauthenticated));
	assert_eq!(broker.store().state(), TokenState::Empty);

	mock.assert_calls_async(0).await;
	session.sign_in(BearerCredential::new(ID_TOKEN));

	let token = broker.store().get_token().await.expect("Retry after sign-in should succeed.");

	assert_eq!(token.value().expose(), "abc123");
}

#[tokio::test]
async fn rejections_carry_the_server_reason_or_a_generic_message() {
	let server = MockServer::start_async().await;
	let mut expired = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(401).json_body(json!({ "error": { "message": "Session expired" } }));
		})
		.await;
	let broker = broker(&server, signed_in_session());
	let err = broker.store().get_token().await.expect_err("A 401 should be a rejection.");

	assert!(err.is_unauthenticated());
	assert_eq!(err.to_string(), "Token endpoint rejected the request: Session expired.");

	expired.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(502).body("<html>Bad gateway</html>");
		})
		.await;

	let err = broker.store().get_token().await.expect_err("A 502 should be a rejection.");

	assert!(matches!(
		err,
		Error::ServerRejection { status: 502, ref message }
			if message == "Token endpoint responded with HTTP 502"
	));
}

#[tokio::test]
async fn success_without_a_token_is_malformed() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200)
				.json_body(json!({ "expiresAt": epoch_millis_from_now(Duration::hours(1)) }));
		})
		.await;

	let broker = broker(&server, signed_in_session());
	let err = broker.store().get_token().await.expect_err("A body without a token should fail.");

	assert!(matches!(err, Error::MalformedResponse { .. }));
	assert_eq!(broker.store().state(), TokenState::Empty);
	assert_eq!(broker.store().metrics().failures(), 1);
}

#[tokio::test]
async fn missing_expiry_falls_back_to_the_configured_ttl() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "token": "abc123" }));
		})
		.await;

	let broker = broker(&server, signed_in_session());
	let before = OffsetDateTime::now_utc();
	let token = broker.store().get_token().await.expect("Token without expiry should be accepted.");
	let after = OffsetDateTime::now_utc();
	let ttl = broker.config().fallback_ttl;

	assert!(token.expires_at() >= before + ttl);
	assert!(token.expires_at() <= after + ttl);
}
