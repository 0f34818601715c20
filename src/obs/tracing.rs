// self
#[cfg(any(test, feature = "tracing"))] use crate::error::UpstreamError;
use crate::{_prelude::*, obs::ConnectorKind};

/// Drives `fut` inside an `identity_connector.op` span.
pub(crate) async fn in_op_span<Fut>(kind: ConnectorKind, op: &'static str, fut: Fut) -> Fut::Output
where
	Fut: Future,
{
	#[cfg(feature = "tracing")]
	{
		use tracing::Instrument;

		fut.instrument(op_span(kind, op)).await
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, op);

		fut.await
	}
}

/// Runs `f` with the `identity_connector.op` span entered.
pub(crate) fn in_op_span_sync<T>(kind: ConnectorKind, op: &'static str, f: impl FnOnce() -> T) -> T {
	#[cfg(feature = "tracing")]
	{
		op_span(kind, op).in_scope(f)
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, op);

		f()
	}
}

#[cfg(feature = "tracing")]
fn op_span(kind: ConnectorKind, op: &'static str) -> tracing::Span {
	tracing::info_span!("identity_connector.op", connector = kind.as_str(), op)
}

/// Warns that a connector transport skips certificate verification.
pub fn warn_trust_downgrade(connector: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(connector, "TLS certificate verification is disabled for this connector.");
	#[cfg(not(feature = "tracing"))]
	let _ = connector;
}

/// Logs a failed operation with the detail that `Display` keeps from end users.
pub fn log_failure(kind: ConnectorKind, op: &'static str, err: &Error) {
	#[cfg(feature = "tracing")]
	match err {
		Error::Upstream(UpstreamError::Api { status, body }) => tracing::debug!(
			connector = kind.as_str(),
			op,
			status,
			body = body.as_str(),
			"Upstream API call failed."
		),
		Error::Upstream(upstream) => tracing::debug!(
			connector = kind.as_str(),
			op,
			status = upstream.status(),
			error = ?upstream,
			"Upstream call failed."
		),
		Error::Config(_) =>
			tracing::warn!(connector = kind.as_str(), op, error = %err, "Connector is misconfigured."),
		_ => tracing::debug!(connector = kind.as_str(), op, error = %err, "Connector operation failed."),
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, op, err);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failure_logging_handles_every_family() {
		log_failure(
			ConnectorKind::OAuth2,
			"refresh",
			&UpstreamError::Api { status: 500, body: "boom".into() }.into(),
		);
		log_failure(ConnectorKind::SessionCookie, "login", &Error::Cancelled);
		warn_trust_downgrade("test");
	}

	#[tokio::test]
	async fn op_span_passes_output_through() {
		assert_eq!(in_op_span(ConnectorKind::OAuth2, "callback", async { 42 }).await, 42);
		assert_eq!(in_op_span_sync(ConnectorKind::SessionCookie, "open", || "ready"), "ready");
	}
}
