// self
use crate::obs::{ConnectorKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: ConnectorKind, op: &'static str, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"identity_connector_op_total",
			"connector" => kind.as_str(),
			"op" => op,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, op, outcome);
	}
}
