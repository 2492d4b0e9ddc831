// self
use crate::{
	obs::{CallOutcome, Operation},
	provider::ProviderKind,
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(provider: ProviderKind, operation: Operation, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_identity_call_total",
			"provider" => provider.as_str(),
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (provider, operation, outcome);
	}
}
