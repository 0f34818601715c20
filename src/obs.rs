//! Optional observability helpers for connector operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `identity_connector.op` with the
//!   `connector` (kind) and `op` (call site) fields, plus warnings for TLS trust downgrades.
//! - Enable `metrics` to increment the `identity_connector_op_total` counter for every
//!   attempt/success/failure, labeled by `connector` + `op` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Connector families known to the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
	/// OAuth 2.0 authorization-code connector with discovery.
	#[serde(rename = "oauth2")]
	OAuth2,
	/// Session-cookie connector backed by a remote session lookup.
	SessionCookie,
}
impl ConnectorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConnectorKind::OAuth2 => "oauth2",
			ConnectorKind::SessionCookie => "session_cookie",
		}
	}
}
impl Display for ConnectorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a connector operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt/success/failure around it.
///
/// Failures are logged before the span closes so the event carries the span fields.
pub(crate) async fn observe<T, Fut>(kind: ConnectorKind, op: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	record_op_outcome(kind, op, OpOutcome::Attempt);

	in_op_span(kind, op, async move {
		let result = fut.await;

		record_result(kind, op, &result);

		result
	})
	.await
}

/// Synchronous counterpart of [`observe`] for operations without network I/O.
pub(crate) fn observe_sync<T>(
	kind: ConnectorKind,
	op: &'static str,
	f: impl FnOnce() -> Result<T>,
) -> Result<T> {
	record_op_outcome(kind, op, OpOutcome::Attempt);

	in_op_span_sync(kind, op, || {
		let result = f();

		record_result(kind, op, &result);

		result
	})
}

fn record_result<T>(kind: ConnectorKind, op: &'static str, result: &Result<T>) {
	match result {
		Ok(_) => record_op_outcome(kind, op, OpOutcome::Success),
		Err(err) => {
			log_failure(kind, op, err);
			record_op_outcome(kind, op, OpOutcome::Failure);
		},
	}
}
