//! Session credential store and the persistence boundary observed by secure storage.
//!
//! [`CredentialStore`] is the single source of truth for the session's token pair. Reads
//! return an immutable [`Arc<Credentials>`] snapshot, so a request dispatched with one
//! snapshot never observes a later swap. Writes replace the whole snapshot in one step and
//! are serialized, giving every reader a last-writer-wins total order.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair},
};

/// Hook for collaborators (e.g., secure storage) that persist or evict credentials.
///
/// Observers run after the new snapshot is visible, outside the read lock, in the same order
/// the writes were applied.
pub trait CredentialObserver
where
	Self: Send + Sync,
{
	/// Called after [`CredentialStore::set_tokens`] installs a new pair.
	fn on_tokens_set(&self, credentials: &Credentials);

	/// Called after [`CredentialStore::clear_tokens`] empties the store.
	fn on_tokens_cleared(&self);
}

/// Thread-safe holder of the current [`Credentials`] snapshot.
#[derive(Default)]
pub struct CredentialStore {
	current: RwLock<Arc<Credentials>>,
	writes: Mutex<()>,
	observers: Vec<Arc<dyn CredentialObserver>>,
}
impl CredentialStore {
	/// Creates a store seeded with credentials restored from durable storage.
	pub fn with_credentials(credentials: Credentials) -> Self {
		Self { current: RwLock::new(Arc::new(credentials)), ..Default::default() }
	}

	/// Registers an observer notified on every set/clear.
	pub fn with_observer(mut self, observer: Arc<dyn CredentialObserver>) -> Self {
		self.observers.push(observer);

		self
	}

	/// Returns the current snapshot.
	pub fn get(&self) -> Arc<Credentials> {
		self.current.read().clone()
	}

	/// Returns `true` when an access token is present.
	pub fn is_authenticated(&self) -> bool {
		self.current.read().access_token.is_some()
	}

	/// Atomically replaces both tokens and returns the installed snapshot.
	pub fn set_tokens(&self, pair: TokenPair) -> Arc<Credentials> {
		let _write = self.writes.lock();
		let next = Arc::new(Credentials::from(pair));

		*self.current.write() = next.clone();

		for observer in &self.observers {
			observer.on_tokens_set(&next);
		}

		next
	}

	/// Atomically clears both tokens.
	pub fn clear_tokens(&self) {
		let _write = self.writes.lock();

		*self.current.write() = Arc::new(Credentials::default());

		for observer in &self.observers {
			observer.on_tokens_cleared();
		}
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore")
			.field("current", &*self.current.read())
			.field("observers", &self.observers.len())
			.finish()
	}
}
