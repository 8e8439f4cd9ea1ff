//! Broker-level error types shared by the fetcher, store, and attachment paths.

// self
use crate::{_prelude::*, config::CsrfConfigError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// The type is `Clone` because a single token acquisition settles once and its
/// outcome is handed to every caller that joined it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts) while reaching the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A payload could not be encoded in the requested representation.
	#[error(transparent)]
	Payload(#[from] PayloadError),

	/// No bearer credential was available when a token was requested.
	#[error("No authenticated session is available to request a CSRF token.")]
	Unauthenticated,
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the request: {message}.")]
	ServerRejection {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Reason derived from the response body, or a generic status message.
		message: String,
	},
	/// Token endpoint answered successfully but the body is unusable.
	#[error("Token endpoint returned a malformed response: {reason}.")]
	MalformedResponse {
		/// Description of what was missing or unparsable.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the failure means the user's session is gone or was refused.
	pub fn is_unauthenticated(&self) -> bool {
		matches!(self, Self::Unauthenticated | Self::ServerRejection { status: 401 | 403, .. })
	}

	/// Actionable text suitable for surfacing to an end user.
	pub fn user_message(&self) -> &'static str {
		match self {
			Self::Unauthenticated | Self::ServerRejection { status: 401 | 403, .. } =>
				"Your session has expired. Please sign in again and retry.",
			Self::Transport(_) =>
				"We could not reach the server. Check your connection and retry.",
			Self::ServerRejection { .. } | Self::MalformedResponse { .. } =>
				"The server could not verify this request. Please retry in a moment.",
			Self::Config(_) | Self::Payload(_) =>
				"This request could not be prepared. Please contact support if it persists.",
		}
	}
}

/// Configuration and wiring failures raised by the broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Builder validation failed.
	#[error(transparent)]
	Invalid(#[from] CsrfConfigError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// No process-wide token store has been installed.
	#[error("No global token store is installed.")]
	GlobalStoreMissing,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Which call failed (`the token endpoint` or `a protected endpoint`).
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Wraps a network error raised while calling the token endpoint.
	pub fn token_endpoint(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target: "the token endpoint", source: Arc::new(src) }
	}

	/// Wraps a network error raised while calling a protected endpoint.
	pub fn protected_endpoint(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target: "a protected endpoint", source: Arc::new(src) }
	}
}

/// Payload encoding failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PayloadError {
	/// A binary part cannot be represented in a text-only encoding.
	#[error("Field `{field}` is binary and cannot be encoded as {encoding}.")]
	BinaryNotEncodable {
		/// Name of the offending field.
		field: String,
		/// Target encoding label.
		encoding: &'static str,
	},
	/// A structured value could not be serialized.
	#[error("Field `{field}` could not be serialized: {message}.")]
	Serialization {
		/// Name of the offending field.
		field: String,
		/// Serializer message.
		message: String,
	},
	/// A part's MIME type was rejected by the multipart encoder.
	#[error("Field `{field}` has an invalid MIME type `{mime}`.")]
	InvalidMime {
		/// Name of the offending field.
		field: String,
		/// MIME string that failed to parse.
		mime: String,
	},
}
