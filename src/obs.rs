//! Observability helpers for broker operations.
//!
//! - Every operation runs inside a `csrf_broker.op` span carrying the `op` and `stage`
//!   fields.
//! - Enable `metrics` to increment the `csrf_broker_op_total` counter for every
//!   attempt/success/failure/degraded outcome, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOp {
	/// `TokenStore::get_token`.
	Acquire,
	/// `TokenStore::refresh_token`.
	Refresh,
	/// `TokenStore::clear_token`.
	Clear,
	/// Request augmentation.
	Augment,
	/// Payload construction.
	Payload,
	/// Lifecycle coordinator reactions.
	Lifecycle,
}
impl TokenOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOp::Acquire => "acquire",
			TokenOp::Refresh => "refresh",
			TokenOp::Clear => "clear",
			TokenOp::Augment => "augment",
			TokenOp::Payload => "payload",
			TokenOp::Lifecycle => "lifecycle",
		}
	}
}
impl Display for TokenOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Failure absorbed by a fail-open path.
	Degraded,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Degraded => "degraded",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
