//! Counters and histograms exported through the `metrics` facade.
//!
//! - `refresh_relay_flow_total{flow,outcome}` counts entries to and completions of each pipeline
//!   stage (first attempt, refresh cycle, replay).
//! - `refresh_relay_refresh_waiters` records how many queued callers one refresh cycle released.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Increments `refresh_relay_flow_total` for one stage outcome.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"refresh_relay_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the number of callers released when a refresh cycle settles.
pub fn record_refresh_waiters(waiters: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("refresh_relay_refresh_waiters").record(waiters as f64);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = waiters;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_every_label() {
		for kind in [FlowKind::Dispatch, FlowKind::Refresh, FlowKind::Replay] {
			for outcome in [FlowOutcome::Attempt, FlowOutcome::Success, FlowOutcome::Failure] {
				record_flow_outcome(kind, outcome);
			}
		}

		record_refresh_waiters(0);
		record_refresh_waiters(16);
	}
}
