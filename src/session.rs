//! Session facade exposing the single `perform_request` entry point.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair},
	config::SessionConfig,
	coordinator::{RefreshCoordinator, RefreshMetrics, Replay},
	dispatch::{self, Dispatcher},
	http::{HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::{EndpointRefreshClient, RefreshClient},
	request::{PublicPaths, RequestDescriptor},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport stack.
pub type ReqwestSession = Session<ReqwestTransport, EndpointRefreshClient<ReqwestTransport>>;

/// Authenticated request pipeline for one signed-in user.
///
/// The session owns the credential store handle, the dispatcher, and the refresh coordinator,
/// so every caller sharing it (typically behind an `Arc`) also shares one refresh cycle.
/// Callers only ever see a success response, an HTTP/transport error, or
/// [`Error::AuthExpired`].
pub struct Session<T, R>
where
	T: ?Sized + HttpTransport,
	R: ?Sized + RefreshClient,
{
	store: Arc<CredentialStore>,
	dispatcher: Dispatcher<T>,
	coordinator: RefreshCoordinator<R>,
	public_paths: PublicPaths,
}
impl<T> Session<T, EndpointRefreshClient<T>>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a session that refreshes through the configured endpoint on `transport`.
	pub fn with_transport(
		config: &SessionConfig,
		store: Arc<CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let dispatcher = Dispatcher::new(transport, config.attempt_timeout);
		let refresher = EndpointRefreshClient::new(dispatcher.clone(), config.refresh_path.clone());

		Self::with_refresh_client(config, store, dispatcher, Arc::new(refresher))
	}
}
impl<T, R> Session<T, R>
where
	T: ?Sized + HttpTransport,
	R: ?Sized + RefreshClient,
{
	/// Creates a session with a caller-provided refresh client.
	pub fn with_refresh_client(
		config: &SessionConfig,
		store: Arc<CredentialStore>,
		dispatcher: Dispatcher<T>,
		refresher: impl Into<Arc<R>>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			coordinator: RefreshCoordinator::new(store.clone(), refresher),
			store,
			dispatcher,
			public_paths: config.public_paths.clone(),
		})
	}

	/// Builds a descriptor whose public flag follows the configured allowlist.
	pub fn request(&self, method: Method, path: impl Into<String>) -> RequestDescriptor {
		let descriptor = RequestDescriptor::new(method, path);
		let is_public = self.public_paths.matches(descriptor.path());

		descriptor.with_public(is_public)
	}

	/// Performs one logical request, refreshing and replaying at most once on `401`.
	///
	/// Paths on the configured allowlist are always sent without a credential and never
	/// trigger a refresh, even when `descriptor` was not marked public.
	pub async fn perform_request(&self, descriptor: RequestDescriptor) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "perform_request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.drive(descriptor)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Performs a request and decodes a 2xx JSON body into `D`.
	pub async fn perform_json<D>(&self, descriptor: RequestDescriptor) -> Result<D>
	where
		D: DeserializeOwned,
	{
		self.perform_request(descriptor).await?.json()
	}

	/// Installs credentials obtained from login, registration, or social sign-in.
	pub fn sign_in(&self, pair: TokenPair) -> Arc<Credentials> {
		self.store.set_tokens(pair)
	}

	/// Clears the session's credentials (logout).
	pub fn sign_out(&self) {
		self.store.clear_tokens();
	}

	/// Current credential snapshot.
	pub fn credentials(&self) -> Arc<Credentials> {
		self.store.get()
	}

	/// Shared credential store.
	pub fn store(&self) -> &Arc<CredentialStore> {
		&self.store
	}

	/// Refresh coordinator owned by this session.
	pub fn coordinator(&self) -> &RefreshCoordinator<R> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	async fn drive(&self, descriptor: RequestDescriptor) -> Result<HttpResponse> {
		// The allowlist applies whether or not the caller built the descriptor via `request`.
		let is_public = descriptor.is_public() || self.public_paths.matches(descriptor.path());
		let descriptor = descriptor.with_public(is_public);
		let snapshot = self.store.get();
		let response = self.dispatcher.dispatch(&descriptor, &snapshot).await?;

		if descriptor.is_public() || !response.is_unauthorized() {
			return dispatch::classify(response);
		}

		let Replay { descriptor, snapshot } =
			self.coordinator.on_unauthorized(&descriptor, &snapshot).await?;

		self.replay(descriptor, snapshot).await
	}

	async fn replay(
		&self,
		descriptor: RequestDescriptor,
		snapshot: Arc<Credentials>,
	) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::new(KIND, "replay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.dispatcher.dispatch(&descriptor, &snapshot).await?;

				if response.is_unauthorized() {
					// Bounded to one replay: the retried descriptor makes this terminal.
					self.coordinator.on_unauthorized(&descriptor, &snapshot).await?;
				}

				dispatch::classify(response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestTransport, EndpointRefreshClient<ReqwestTransport>> {
	/// Creates a reqwest-backed session over a fresh credential store.
	pub fn new(config: &SessionConfig) -> Result<Self> {
		Self::with_store(config, Arc::new(CredentialStore::default()))
	}

	/// Creates a reqwest-backed session over an existing (e.g., restored) credential store.
	///
	/// Fails with [`ConfigError::HttpClientBuild`](crate::error::ConfigError::HttpClientBuild)
	/// when the reqwest client cannot be constructed.
	pub fn with_store(config: &SessionConfig, store: Arc<CredentialStore>) -> Result<Self> {
		Self::with_transport(config, store, ReqwestTransport::from_config(config)?)
	}
}
impl<T, R> Debug for Session<T, R>
where
	T: ?Sized + HttpTransport,
	R: ?Sized + RefreshClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("store", &self.store)
			.field("dispatcher", &self.dispatcher)
			.field("coordinator", &self.coordinator)
			.field("public_paths", &self.public_paths)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		attach::PreparedRequest,
		auth::TokenSecret,
		error::AuthExpiredReason,
		http::TransportFuture,
		refresh::{RefreshError, RefreshFuture},
	};

	/// Accepts exactly one bearer and records every bearer it was shown.
	struct ScriptedTransport {
		accepted: Mutex<String>,
		seen: Mutex<Vec<(String, Option<String>)>>,
	}
	impl ScriptedTransport {
		fn accepting(token: &str) -> Self {
			Self { accepted: Mutex::new(token.into()), seen: Mutex::new(Vec::new()) }
		}

		fn seen(&self) -> Vec<(String, Option<String>)> {
			self.seen.lock().clone()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: PreparedRequest) -> TransportFuture<'_> {
			let bearer = request.bearer().map(str::to_owned);
			let authorized = bearer.as_deref() == Some(self.accepted.lock().as_str());

			self.seen.lock().push((request.path.clone(), bearer));

			Box::pin(async move {
				let response = if request.path.starts_with("/auth/login") {
					HttpResponse::with_status(StatusCode::UNAUTHORIZED, "bad password")
				} else if authorized {
					HttpResponse::with_status(StatusCode::OK, r#"{"id":7,"name":"harbor"}"#)
				} else {
					HttpResponse::with_status(StatusCode::UNAUTHORIZED, "")
				};

				Ok(response)
			})
		}
	}

	#[derive(Default)]
	struct CountingRefresher {
		calls: AtomicUsize,
	}
	impl RefreshClient for CountingRefresher {
		fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if refresh_token.expose() != "refresh-1" {
					return Err(RefreshError::Rejected { status: 401, body: String::new() });
				}

				Ok(TokenPair::new("access-2", "refresh-2"))
			})
		}
	}

	#[derive(Debug, PartialEq, Eq, Deserialize)]
	struct Listing {
		id: u32,
		name: String,
	}

	type TestSession = Session<ScriptedTransport, CountingRefresher>;

	fn session(accepted: &str) -> (TestSession, Arc<ScriptedTransport>) {
		let config =
			SessionConfig::new(Url::parse("https://api.example.com").expect("URL should parse."));
		let store =
			Arc::new(CredentialStore::with_credentials(TokenPair::new("access-1", "refresh-1").into()));
		let transport = Arc::new(ScriptedTransport::accepting(accepted));
		let dispatcher = Dispatcher::<ScriptedTransport>::new(transport.clone(), config.attempt_timeout);
		let session = Session::with_refresh_client(
			&config,
			store,
			dispatcher,
			CountingRefresher::default(),
		)
		.expect("Session configuration should be valid.");

		(session, transport)
	}

	#[tokio::test]
	async fn rejected_request_is_refreshed_and_replayed_once() {
		let (session, transport) = session("access-2");
		let listing: Listing = session
			.perform_json(session.request(Method::GET, "/listings/7"))
			.await
			.expect("Replay with the refreshed bearer should succeed.");

		assert_eq!(listing, Listing { id: 7, name: "harbor".into() });
		assert_eq!(session.credentials().access_token(), Some("access-2"));
		assert_eq!(session.coordinator().refresher().calls.load(Ordering::SeqCst), 1);
		assert_eq!(
			transport.seen(),
			vec![
				("/listings/7".to_owned(), Some("access-1".to_owned())),
				("/listings/7".to_owned(), Some("access-2".to_owned())),
			]
		);
	}

	#[tokio::test]
	async fn second_rejection_is_terminal_and_keeps_credentials() {
		let (session, transport) = session("access-never");
		let err = session
			.perform_request(session.request(Method::GET, "/bookings"))
			.await
			.expect_err("A replay rejected again should expire the call.");

		assert!(matches!(err, Error::AuthExpired(AuthExpiredReason::ReplayRejected)));
		assert_eq!(transport.seen().len(), 2);
		assert_eq!(session.refresh_metrics().attempts(), 1);
		assert_eq!(session.credentials().access_token(), Some("access-2"));
	}

	#[tokio::test]
	async fn public_rejection_passes_through_untouched() {
		let (session, transport) = session("access-1");
		let descriptor = session.request(Method::POST, "/auth/login");

		assert!(descriptor.is_public());

		let err = session
			.perform_request(descriptor)
			.await
			.expect_err("Public 401 should surface as an HTTP status.");

		assert_eq!(err.status(), Some(401));
		assert!(!err.is_auth_expired());
		assert_eq!(transport.seen(), vec![("/auth/login".to_owned(), None)]);
		assert_eq!(session.refresh_metrics().attempts(), 0);
		assert_eq!(session.credentials().access_token(), Some("access-1"));
	}

	#[tokio::test]
	async fn allowlisted_paths_bypass_credentials_without_the_public_flag() {
		let (session, transport) = session("access-2");
		let descriptor = RequestDescriptor::new(Method::GET, "/catalog/42");

		assert!(!descriptor.is_public());

		let err = session
			.perform_request(descriptor)
			.await
			.expect_err("An allowlisted 401 should surface as an HTTP status.");

		assert_eq!(err.status(), Some(401));
		assert_eq!(transport.seen(), vec![("/catalog/42".to_owned(), None)]);
		assert_eq!(session.coordinator().refresher().calls.load(Ordering::SeqCst), 0);
		assert_eq!(session.credentials().access_token(), Some("access-1"));
	}

	#[tokio::test]
	async fn signed_out_session_expires_without_a_refresh_call() {
		let (session, transport) = session("access-1");

		session.sign_out();

		let err = session
			.perform_request(session.request(Method::GET, "/bookings"))
			.await
			.expect_err("Missing credentials should expire the call.");

		assert!(matches!(err, Error::AuthExpired(AuthExpiredReason::MissingRefreshToken)));
		assert_eq!(transport.seen(), vec![("/bookings".to_owned(), None)]);
		assert_eq!(session.coordinator().refresher().calls.load(Ordering::SeqCst), 0);

		session.sign_in(TokenPair::new("access-1", "refresh-1"));

		session
			.perform_request(session.request(Method::GET, "/bookings"))
			.await
			.expect("Signing back in should restore access.");
	}
}
