//! Authenticated request pipeline with single-flight bearer refresh, bounded replay, and
//! transport-aware observability.
//!
//! Every protected call flows through [`session::Session::perform_request`]. The session
//! attaches the current bearer snapshot, and when the server rejects it with `401` the
//! [`coordinator::RefreshCoordinator`] refreshes the credential pair exactly once for all
//! overlapping callers before replaying each affected request a single time.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod attach;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::SessionConfig,
		http::ReqwestTransport,
		session::{ReqwestSession, Session},
		store::CredentialStore,
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport(base_url: Url) -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client, base_url)
	}

	/// Builds a session configuration pointing at a local mock server over plain HTTP.
	pub fn test_session_config(base_url: &str) -> SessionConfig {
		SessionConfig::new(Url::parse(base_url).expect("Mock server base URL should parse."))
			.allow_insecure_http(true)
	}

	/// Constructs a [`ReqwestSession`] backed by a fresh credential store and the reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_session(
		config: SessionConfig,
	) -> (ReqwestSession, Arc<CredentialStore>) {
		let store = Arc::new(CredentialStore::default());
		let transport = test_reqwest_transport(config.base_url.clone());
		let session = Session::with_transport(&config, store.clone(), transport)
			.expect("Test session configuration should be valid.");

		(session, store)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
