//! Optional observability helpers for adapter calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_identity.call` with the `provider`
//!   and `operation` fields, plus warnings for degraded-but-successful calls.
//! - Enable `metrics` to increment the `oauth2_identity_call_total` counter for every
//!   attempt/success/failure, labeled by `provider` + `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{
	_prelude::*,
	context::CallContext,
	error::ProviderFailure,
	provider::{ProviderFuture, ProviderKind},
};

/// Contract operations observed by the adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Authorization URL construction.
	Authorize,
	/// Code-for-token exchange.
	Exchange,
	/// Identity lookup.
	Identity,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Authorize => "authorize",
			Operation::Exchange => "exchange",
			Operation::Identity => "identity",
		}
	}

	/// Wraps `failure` in the error variant owned by this operation.
	pub(crate) fn error(self, provider: ProviderKind, failure: impl Into<ProviderFailure>) -> Error {
		match self {
			Operation::Identity => Error::identity_fetch(provider, failure),
			Operation::Authorize | Operation::Exchange => Error::token_exchange(provider, failure),
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to an adapter operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs a network-bound adapter operation inside its span and records the outcome.
///
/// The whole operation runs under `ctx`, so its deadline covers every round trip the adapter
/// makes rather than each request on its own.
pub(crate) fn observed<'a, T, F>(
	provider: ProviderKind,
	operation: Operation,
	ctx: &'a CallContext,
	fut: F,
) -> ProviderFuture<'a, T>
where
	F: 'a + Send + Future<Output = Result<T>>,
{
	let span = CallSpan::new(provider, operation);

	Box::pin(span.instrument(async move {
		record_call_outcome(provider, operation, CallOutcome::Attempt);

		let result = match ctx.guard(fut).await {
			Ok(result) => result,
			Err(e) => Err(operation.error(provider, e)),
		};
		let outcome = if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure };

		record_call_outcome(provider, operation, outcome);

		result
	}))
}
