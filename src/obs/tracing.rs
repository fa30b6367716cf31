// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by pipeline stages.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("refresh_relay.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when the coordinator's refresh state changes.
pub fn record_state_transition(from: &'static str, to: &'static str, waiters: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target: "refresh_relay", from, to, waiters, "refresh state transition");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to, waiters);
	}
}

/// Emits a debug event when a request is queued behind an in-flight refresh.
pub fn record_enqueued(path: &str, pending: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target: "refresh_relay", path, pending, "request queued behind refresh");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (path, pending);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn helpers_noop_without_tracing() {
		let _span = FlowSpan::new(FlowKind::Dispatch, "test");

		record_state_transition("idle", "refreshing", 0);
		record_enqueued("/orders", 1);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Replay, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
