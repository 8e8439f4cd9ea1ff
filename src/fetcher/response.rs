//! Token endpoint wire format.

// crates.io
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, token::CsrfToken};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
	#[serde(default)]
	token: Option<String>,
	#[serde(default, alias = "expires_at")]
	expires_at: Option<ExpiresAt>,
}

/// Expiry as either an RFC 3339 timestamp or Unix epoch milliseconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresAt {
	Rfc3339(String),
	EpochMillis(i64),
}
impl ExpiresAt {
	fn resolve(self) -> Result<OffsetDateTime> {
		match self {
			Self::Rfc3339(raw) =>
				OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|e| Error::MalformedResponse {
					reason: format!("expiresAt `{raw}` is not RFC 3339: {e}"),
				}),
			Self::EpochMillis(millis) =>
				OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).map_err(
					|_| Error::MalformedResponse {
						reason: format!("expiresAt {millis} is outside the supported range"),
					},
				),
		}
	}
}

/// Parses a success body into a token, substituting `now + fallback_ttl` for a missing expiry.
pub(super) fn parse_token(
	body: &[u8],
	now: OffsetDateTime,
	fallback_ttl: Duration,
) -> Result<CsrfToken> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: TokenBody = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| Error::MalformedResponse { reason: e.to_string() })?;
	let token = parsed
		.token
		.filter(|value| !value.is_empty())
		.ok_or_else(|| Error::MalformedResponse { reason: "missing `token` value".into() })?;
	let expires_at = match parsed.expires_at {
		Some(raw) => raw.resolve()?,
		None => now + fallback_ttl,
	};

	Ok(CsrfToken::new(token, expires_at))
}

/// Derives a human-readable reason from a non-success body.
pub(super) fn rejection_message(status: u16, body: &[u8]) -> String {
	serde_json::from_slice::<Value>(body)
		.ok()
		.and_then(|value| {
			value
				.pointer("/error/message")
				.and_then(Value::as_str)
				.or_else(|| value.get("error").and_then(Value::as_str))
				.or_else(|| value.get("message").and_then(Value::as_str))
				.map(str::trim)
				.filter(|message| !message.is_empty())
				.map(str::to_owned)
		})
		.unwrap_or_else(|| format!("Token endpoint responded with HTTP {status}"))
}
