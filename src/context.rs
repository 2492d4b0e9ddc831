//! Per-call cancellation and deadline handling.
//!
//! Every network-bound adapter operation takes a [`CallContext`]. The context never retries;
//! it only bounds how long a single attempt may run and lets the caller abort it. Dropping the
//! returned future also aborts the in-flight request.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::TransportError};

/// Cancellable, optionally time-bounded context for one provider call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	/// Upper bound for the whole call (all round trips), if any.
	pub timeout: Option<std::time::Duration>,
	/// Token the caller may cancel to abort the call.
	pub cancellation: CancellationToken,
}
impl CallContext {
	/// Context without a deadline, cancellable through its own token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies a deadline to the call.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Ties the call to an existing cancellation token (e.g. a request-scoped one).
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = token;

		self
	}

	/// Cancels the call.
	pub fn cancel(&self) {
		self.cancellation.cancel();
	}

	/// Runs `fut` under this context's deadline and cancellation token.
	pub async fn guard<F>(&self, fut: F) -> Result<F::Output, TransportError>
	where
		F: Future,
	{
		if self.cancellation.is_cancelled() {
			return Err(TransportError::Cancelled);
		}

		let bounded = async {
			match self.timeout {
				Some(after) => tokio::time::timeout(after, fut)
					.await
					.map_err(|_| TransportError::TimedOut { after }),
				None => Ok(fut.await),
			}
		};

		self.cancellation.run_until_cancelled(bounded).await.unwrap_or(Err(TransportError::Cancelled))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn guard_passes_through_completed_futures() {
		let ctx = CallContext::new().with_timeout(std::time::Duration::from_secs(5));
		let value = ctx.guard(async { 7 }).await.expect("Ready futures should complete.");

		assert_eq!(value, 7);
	}

	#[tokio::test]
	async fn guard_rejects_cancelled_context() {
		let ctx = CallContext::new();

		ctx.cancel();

		let err = ctx.guard(async { 7 }).await.expect_err("Cancelled contexts must not run.");

		assert!(matches!(err, TransportError::Cancelled));
	}

	#[tokio::test]
	async fn guard_times_out_pending_futures() {
		let ctx = CallContext::new().with_timeout(std::time::Duration::from_millis(10));
		let err = ctx
			.guard(std::future::pending::<()>())
			.await
			.expect_err("Pending futures should hit the deadline.");

		assert!(matches!(err, TransportError::TimedOut { .. }));
	}

	#[tokio::test]
	async fn guard_observes_cancellation_mid_flight() {
		let ctx = CallContext::new();
		let token = ctx.cancellation.clone();
		let canceller = tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			token.cancel();
		});
		let err = ctx
			.guard(std::future::pending::<()>())
			.await
			.expect_err("Cancellation should abort pending futures.");

		canceller.await.expect("Canceller task should finish.");

		assert!(matches!(err, TransportError::Cancelled));
	}
}
