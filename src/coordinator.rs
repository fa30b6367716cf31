//! Single-flight refresh coordination for requests rejected with `401`.
//!
//! One [`RefreshCoordinator`] exists per session and owns the `(RefreshState, queue)` pair.
//! The check-transition-enqueue step runs under a synchronous mutex that is never held across
//! an `.await`, so two callers can never both observe [`RefreshState::Idle`] and both start a
//! refresh, whether the runtime is cooperative or multi-threaded.
//!
//! The first rejected caller starts a refresh cycle on its own task. Every rejected caller,
//! the one that started the cycle included, is queued on a oneshot handle and suspends until
//! the cycle settles the queue, after which each replays its own descriptor with the snapshot
//! the refresh produced. A caller that gives up only drops its handle: the refresh call keeps
//! running and every queued handle is still settled exactly once.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::Credentials,
	error::AuthExpiredReason,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::RefreshClient,
	request::RequestDescriptor,
	store::CredentialStore,
};

const UNSETTLED_CYCLE: &str = "the refresh task ended before settling.";

/// Coordinator state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh in flight.
	#[default]
	Idle,
	/// A refresh call is in flight; rejected callers queue behind it.
	Refreshing,
}
impl RefreshState {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshState::Idle => "idle",
			RefreshState::Refreshing => "refreshing",
		}
	}
}

/// Descriptor copy and credential snapshot a rejected request must be replayed with.
#[derive(Clone, Debug)]
pub struct Replay {
	/// Copy of the rejected descriptor, marked as retried.
	pub descriptor: RequestDescriptor,
	/// Snapshot produced by the settled refresh (or installed by a refresh that completed
	/// after the rejected attempt was sent).
	pub snapshot: Arc<Credentials>,
}

#[derive(Clone, Debug)]
enum Settlement {
	Refreshed(Arc<Credentials>),
	Expired(AuthExpiredReason),
}

enum Ticket {
	Replay(Arc<Credentials>),
	Wait(oneshot::Receiver<Settlement>),
}

#[derive(Default)]
struct Inner {
	state: RefreshState,
	queue: Vec<oneshot::Sender<Settlement>>,
}

struct Shared<R>
where
	R: ?Sized + RefreshClient,
{
	store: Arc<CredentialStore>,
	refresher: Arc<R>,
	inner: Mutex<Inner>,
	metrics: Arc<RefreshMetrics>,
}
impl<R> Shared<R>
where
	R: ?Sized + RefreshClient,
{
	async fn refresh(&self) -> Settlement {
		const KIND: FlowKind = FlowKind::Refresh;

		let Some(refresh_token) = self.store.get().refresh_token.clone() else {
			self.store.clear_tokens();
			self.metrics.record_failure();

			return Settlement::Expired(AuthExpiredReason::MissingRefreshToken);
		};
		let span = FlowSpan::new(KIND, "refresh_cycle");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		match span.instrument(self.refresher.refresh(&refresh_token)).await {
			Ok(pair) => {
				let snapshot = self.store.set_tokens(pair);

				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Settlement::Refreshed(snapshot)
			},
			Err(err) => {
				self.store.clear_tokens();
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Settlement::Expired(AuthExpiredReason::from(&err))
			},
		}
	}

	fn release(&self, settlement: Settlement) {
		let waiters = {
			let mut inner = self.inner.lock();

			inner.state = RefreshState::Idle;

			mem::take(&mut inner.queue)
		};

		obs::record_state_transition(
			RefreshState::Refreshing.as_str(),
			RefreshState::Idle.as_str(),
			waiters.len(),
		);
		obs::record_refresh_waiters(waiters.len());

		for settle in waiters {
			// A dropped receiver means the caller gave up; its handle is still consumed.
			let _ = settle.send(settlement.clone());

			self.metrics.record_settled();
		}
	}
}

/// Session-scoped state machine that refreshes credentials once for all overlapping `401`s.
///
/// Refresh cycles run on spawned tasks, so the coordinator must be used from within a Tokio
/// runtime.
pub struct RefreshCoordinator<R>
where
	R: ?Sized + RefreshClient,
{
	shared: Arc<Shared<R>>,
}
impl<R> RefreshCoordinator<R>
where
	R: ?Sized + RefreshClient,
{
	/// Creates an idle coordinator over `store` and `refresher`.
	pub fn new(store: Arc<CredentialStore>, refresher: impl Into<Arc<R>>) -> Self {
		Self {
			shared: Arc::new(Shared {
				store,
				refresher: refresher.into(),
				inner: Mutex::new(Inner::default()),
				metrics: Default::default(),
			}),
		}
	}

	/// Current state.
	pub fn state(&self) -> RefreshState {
		self.shared.inner.lock().state
	}

	/// Number of callers currently queued behind the in-flight refresh.
	pub fn pending(&self) -> usize {
		self.shared.inner.lock().queue.len()
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.shared.metrics
	}

	/// Refresh endpoint client.
	pub fn refresher(&self) -> &Arc<R> {
		&self.shared.refresher
	}

	/// Handles a `401` received for `descriptor`, which was sent with `rejected`.
	///
	/// - An already replayed descriptor fails with [`AuthExpiredReason::ReplayRejected`].
	/// - If a newer access token was installed after `rejected` was taken, the descriptor is
	///   replayed with it immediately.
	/// - If idle, a refresh cycle is started; either way the caller queues behind it.
	///
	/// On success the returned [`Replay`] carries the descriptor copy and snapshot to send;
	/// every refresh failure surfaces as [`Error::AuthExpired`]. Dropping the returned future
	/// never cancels the refresh call.
	pub async fn on_unauthorized(
		&self,
		descriptor: &RequestDescriptor,
		rejected: &Credentials,
	) -> Result<Replay> {
		if descriptor.retried() {
			return Err(AuthExpiredReason::ReplayRejected.into());
		}

		let snapshot = match self.enter(descriptor.path(), rejected) {
			Ticket::Replay(snapshot) => snapshot,
			Ticket::Wait(settlement) => match settlement.await {
				Ok(Settlement::Refreshed(snapshot)) => snapshot,
				Ok(Settlement::Expired(reason)) => return Err(reason.into()),
				Err(_) =>
					return Err(
						AuthExpiredReason::RefreshFailed { message: UNSETTLED_CYCLE.into() }.into()
					),
			},
		};

		Ok(Replay { descriptor: descriptor.replayed(), snapshot })
	}

	fn enter(&self, path: &str, rejected: &Credentials) -> Ticket {
		let (settle, settlement) = oneshot::channel();
		let start = {
			let mut inner = self.shared.inner.lock();
			let start = inner.state == RefreshState::Idle;

			if start {
				let current = self.shared.store.get();

				if current.supersedes(rejected) {
					return Ticket::Replay(current);
				}

				inner.state = RefreshState::Refreshing;
				obs::record_state_transition(
					RefreshState::Idle.as_str(),
					RefreshState::Refreshing.as_str(),
					0,
				);
			}

			inner.queue.push(settle);
			self.shared.metrics.record_queued();
			obs::record_enqueued(path, inner.queue.len());

			start
		};

		// Spawned outside the lock: a cycle dropped without running releases the queue itself.
		if start {
			tokio::spawn(RefreshCycle { shared: self.shared.clone(), settled: false }.run());
		}

		Ticket::Wait(settlement)
	}
}
impl<R> Debug for RefreshCoordinator<R>
where
	R: ?Sized + RefreshClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let inner = self.shared.inner.lock();

		f.debug_struct("RefreshCoordinator")
			.field("state", &inner.state)
			.field("pending", &inner.queue.len())
			.field("metrics", &self.shared.metrics)
			.finish()
	}
}

/// One refresh cycle; settles the queue when it completes or is dropped unfinished.
struct RefreshCycle<R>
where
	R: ?Sized + RefreshClient,
{
	shared: Arc<Shared<R>>,
	settled: bool,
}
impl<R> RefreshCycle<R>
where
	R: ?Sized + RefreshClient,
{
	async fn run(self) {
		let settlement = self.shared.refresh().await;

		self.settle(settlement);
	}

	fn settle(mut self, settlement: Settlement) {
		self.settled = true;
		self.shared.release(settlement);
	}
}
impl<R> Drop for RefreshCycle<R>
where
	R: ?Sized + RefreshClient,
{
	fn drop(&mut self) {
		if !self.settled {
			self.shared.release(Settlement::Expired(AuthExpiredReason::RefreshFailed {
				message: UNSETTLED_CYCLE.into(),
			}));
		}
	}
}
