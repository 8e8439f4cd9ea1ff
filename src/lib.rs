//! Client-side CSRF token broker: single-flight token acquisition, fail-open request
//! augmentation, token-bearing payloads, and token lifecycles tied to the user's session.
//!
//! The crate implements the client half of the double-submit cookie pattern. A
//! [`store::TokenStore`] caches one short-lived anti-forgery token, the
//! [`augment::RequestAugmenter`] and [`payload::PayloadBuilder`] attach it to outgoing
//! mutations, and the [`lifecycle::LifecycleCoordinator`] clears or refreshes it as the
//! authentication session changes. [`broker::CsrfBroker`] wires the pieces together.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod augment;
pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod lifecycle;
pub mod obs;
pub mod payload;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
