//! Validated broker configuration and its builder.

// crates.io
use reqwest::header::HeaderName;
use url::{Host, Origin};
// self
use crate::_prelude::*;

/// Errors raised while constructing or validating a [`CsrfConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CsrfConfigError {
	/// Token endpoint must use HTTPS outside of loopback development hosts.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Protected origins must be tuple origins (scheme, host, port).
	#[error("Protected origin `{url}` is not a valid HTTP(S) origin.")]
	OpaqueOrigin {
		/// URL the origin was derived from.
		url: String,
	},
	/// Header name is not a valid HTTP header token.
	#[error("`{name}` is not a valid HTTP header name.")]
	InvalidHeaderName {
		/// Rejected header name.
		name: String,
	},
	/// Form field name is empty or contains control characters.
	#[error("Payload field name must be non-empty printable text.")]
	InvalidFieldName,
	/// A duration setting must be strictly positive.
	#[error("The {setting} setting must be positive.")]
	NonPositiveDuration {
		/// Setting label.
		setting: &'static str,
	},
	/// Periodic refresh must fire well inside the token lifetime.
	#[error("Refresh interval ({interval}) must be shorter than the token lifetime ({ttl}).")]
	RefreshIntervalTooLong {
		/// Configured refresh interval.
		interval: Duration,
		/// Configured token lifetime.
		ttl: Duration,
	},
	/// Rejection statuses must be client or server errors.
	#[error("Status {status} cannot signal a rejected CSRF token.")]
	InvalidRejectionStatus {
		/// Rejected status code.
		status: u16,
	},
}

/// Immutable broker configuration consumed by every component.
#[derive(Clone, Debug)]
pub struct CsrfConfig {
	/// Endpoint that issues CSRF tokens.
	pub token_endpoint: Url,
	/// Origins that receive the token header and the transport cookie.
	pub protected_origins: Vec<Origin>,
	/// Header carrying the token on augmented requests.
	pub header_name: HeaderName,
	/// Field carrying the token inside built payloads.
	pub field_name: String,
	/// Lifetime assumed when the endpoint omits an expiry.
	pub fallback_ttl: Duration,
	/// Period of the background refresh timer.
	pub refresh_interval: Duration,
	/// Timeout applied to every HTTP exchange.
	pub request_timeout: Duration,
	/// Response statuses treated as "token rejected" on protected calls.
	pub rejection_statuses: Vec<u16>,
}
impl CsrfConfig {
	/// Default header name used by the double-submit check.
	pub const DEFAULT_HEADER_NAME: &'static str = "x-csrf-token";
	/// Default payload field name.
	pub const DEFAULT_FIELD_NAME: &'static str = "csrf_token";
	/// Lifetime assumed for tokens that arrive without an expiry.
	pub const DEFAULT_FALLBACK_TTL: Duration = Duration::hours(24);
	/// Background refresh period; strictly shorter than the default lifetime.
	pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::hours(20);
	/// Default HTTP timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder for the provided token endpoint.
	pub fn builder(token_endpoint: Url) -> CsrfConfigBuilder {
		CsrfConfigBuilder::new(token_endpoint)
	}

	/// Returns `true` when `url` belongs to one of the protected origins.
	pub fn is_protected(&self, url: &Url) -> bool {
		let origin = url.origin();

		self.protected_origins.iter().any(|protected| *protected == origin)
	}

	/// Returns `true` when a protected call's status means the token was refused.
	pub fn is_rejection(&self, status: u16) -> bool {
		self.rejection_statuses.contains(&status)
	}

	fn validate(&self) -> Result<(), CsrfConfigError> {
		validate_endpoint(&self.token_endpoint)?;

		if self.field_name.is_empty() || self.field_name.chars().any(char::is_control) {
			return Err(CsrfConfigError::InvalidFieldName);
		}

		validate_positive("fallback_ttl", self.fallback_ttl)?;
		validate_positive("refresh_interval", self.refresh_interval)?;
		validate_positive("request_timeout", self.request_timeout)?;

		if self.refresh_interval >= self.fallback_ttl {
			return Err(CsrfConfigError::RefreshIntervalTooLong {
				interval: self.refresh_interval,
				ttl: self.fallback_ttl,
			});
		}
		if let Some(&status) =
			self.rejection_statuses.iter().find(|status| !(400..600).contains(*status))
		{
			return Err(CsrfConfigError::InvalidRejectionStatus { status });
		}

		Ok(())
	}
}

/// Builder for [`CsrfConfig`] values.
#[derive(Debug)]
pub struct CsrfConfigBuilder {
	token_endpoint: Url,
	protected_origins: Vec<Url>,
	header_name: String,
	field_name: String,
	fallback_ttl: Duration,
	refresh_interval: Duration,
	request_timeout: Duration,
	rejection_statuses: Vec<u16>,
}
impl CsrfConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(token_endpoint: Url) -> Self {
		Self {
			token_endpoint,
			protected_origins: Vec::new(),
			header_name: CsrfConfig::DEFAULT_HEADER_NAME.into(),
			field_name: CsrfConfig::DEFAULT_FIELD_NAME.into(),
			fallback_ttl: CsrfConfig::DEFAULT_FALLBACK_TTL,
			refresh_interval: CsrfConfig::DEFAULT_REFRESH_INTERVAL,
			request_timeout: CsrfConfig::DEFAULT_REQUEST_TIMEOUT,
			rejection_statuses: vec![403],
		}
	}

	/// Adds an origin that should receive the token. The token endpoint's origin is used when
	/// none are configured.
	pub fn protect_origin(mut self, url: Url) -> Self {
		self.protected_origins.push(url);

		self
	}

	/// Overrides the header carrying the token.
	pub fn header_name(mut self, name: impl Into<String>) -> Self {
		self.header_name = name.into();

		self
	}

	/// Overrides the payload field carrying the token.
	pub fn field_name(mut self, name: impl Into<String>) -> Self {
		self.field_name = name.into();

		self
	}

	/// Overrides the lifetime assumed for tokens without an expiry.
	pub fn fallback_ttl(mut self, ttl: Duration) -> Self {
		self.fallback_ttl = ttl;

		self
	}

	/// Overrides the background refresh period.
	pub fn refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = interval;

		self
	}

	/// Overrides the HTTP timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Replaces the statuses treated as token rejections.
	pub fn rejection_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.rejection_statuses = statuses.into_iter().collect();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<CsrfConfig, CsrfConfigError> {
		let header_name = HeaderName::from_bytes(self.header_name.as_bytes())
			.map_err(|_| CsrfConfigError::InvalidHeaderName { name: self.header_name.clone() })?;
		let sources = if self.protected_origins.is_empty() {
			vec![self.token_endpoint.clone()]
		} else {
			self.protected_origins
		};
		let mut protected_origins = Vec::with_capacity(sources.len());

		for url in sources {
			let origin = url.origin();

			if !origin.is_tuple() || !matches!(url.scheme(), "http" | "https") {
				return Err(CsrfConfigError::OpaqueOrigin { url: url.to_string() });
			}
			if !protected_origins.contains(&origin) {
				protected_origins.push(origin);
			}
		}

		let config = CsrfConfig {
			token_endpoint: self.token_endpoint,
			protected_origins,
			header_name,
			field_name: self.field_name,
			fallback_ttl: self.fallback_ttl,
			refresh_interval: self.refresh_interval,
			request_timeout: self.request_timeout,
			rejection_statuses: self.rejection_statuses,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_endpoint(url: &Url) -> Result<(), CsrfConfigError> {
	let loopback = match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(addr)) => addr.is_loopback(),
		Some(Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(CsrfConfigError::InsecureEndpoint { url: url.to_string() })
	}
}

fn validate_positive(setting: &'static str, value: Duration) -> Result<(), CsrfConfigError> {
	if value.is_positive() { Ok(()) } else { Err(CsrfConfigError::NonPositiveDuration { setting }) }
}
