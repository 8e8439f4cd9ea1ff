//! Demonstrates a checkout flow guarded by a CSRF token: the broker fetches the token once,
//! replays the endpoint's cookie, and keeps the token aligned with the session.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;
// self
use csrf_broker::{
	auth::{AuthSession, BearerCredential},
	broker::CsrfBroker,
	config::CsrfConfig,
	payload::{BinaryPart, Payload},
	reqwest::{Method, header::CONTENT_TYPE},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("csrf_broker=debug"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/csrf").header("authorization", "Bearer demo-id-token");
			then.status(200)
				.header("set-cookie", "csrf_secret=demo-secret; Path=/; HttpOnly")
				.json_body(json!({ "token": "demo-csrf", "expiresAt": "2099-01-01T00:00:00Z" }));
		})
		.await;
	let checkout_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/checkout")
				.header("x-csrf-token", "demo-csrf")
				.header("cookie", "csrf_secret=demo-secret");
			then.status(201).json_body(json!({ "order": "ord_42" }));
		})
		.await;
	let upload_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/receipts");
			then.status(202);
		})
		.await;
	let session = Arc::new(AuthSession::new());
	let config = CsrfConfig::builder(Url::parse(&server.url("/api/csrf"))?).build()?;
	let broker = CsrfBroker::new(config, session.clone())?;
	let lifecycle = broker.start_lifecycle(session.subscribe());

	session.sign_in(BearerCredential::new("demo-id-token"));

	let client = broker.protected_client();
	let response = client
		.send(
			client
				.request(Method::POST, Url::parse(&server.url("/api/checkout"))?)
				.header(CONTENT_TYPE, "application/json")
				.body(json!({ "sku": "A-1", "quantity": 2 }).to_string()),
		)
		.await?;

	println!("Checkout answered HTTP {}.", response.status());

	let form = broker
		.payload_builder()
		.build(
			Payload::new()
				.structured("order", &json!({ "id": "ord_42", "total": 1999 }))?
				.binary(
					"receipt",
					BinaryPart::new(b"%PDF-1.7".to_vec())
						.with_file_name("receipt.pdf")
						.with_mime("application/pdf"),
				),
		)
		.await?
		.into_multipart()?;
	let upload = client.request(Method::POST, Url::parse(&server.url("/api/receipts"))?);
	let response = client.send(upload.multipart(form)).await?;

	println!("Receipt upload answered HTTP {}.", response.status());
	println!("Token fetches: {}.", broker.store().metrics().fetches());

	session.sign_out();
	lifecycle.shutdown().await;

	checkout_mock.assert_async().await;
	upload_mock.assert_async().await;

	Ok(())
}
