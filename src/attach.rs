//! Credential attachment for outgoing requests.
//!
//! [`attach_credentials`] is a pure function of a descriptor and a credential snapshot: it
//! owns no state and performs no I/O, so the same inputs always yield the same request.

// crates.io
use ::http::header::AUTHORIZATION;
// self
use crate::{_prelude::*, auth::Credentials, error::ConfigError, request::RequestDescriptor};

/// Wire-ready request produced by [`attach_credentials`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the transport base URL (may carry a query string).
	pub path: String,
	/// Final header set, including `Authorization` when a bearer was attached.
	pub headers: HeaderMap,
	/// Request body; empty when none.
	pub body: Vec<u8>,
}
impl PreparedRequest {
	/// Returns the attached bearer value, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}
}

/// Decides whether and how to attach the snapshot's credential to `descriptor`.
///
/// - Public descriptors are sent without an `Authorization` header, even when a token exists.
/// - Protected descriptors carry `Authorization: Bearer <access_token>` when one is present.
/// - Without an access token the request goes out bare and the server is expected to reject it.
pub fn attach_credentials(
	descriptor: &RequestDescriptor,
	snapshot: &Credentials,
) -> Result<PreparedRequest, ConfigError> {
	let mut headers = descriptor.headers().clone();

	headers.remove(AUTHORIZATION);

	let token = if descriptor.is_public() { None } else { snapshot.access_token() };

	if let Some(token) = token {
		let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
			.map_err(|source| ConfigError::InvalidHeader { header: "authorization", source })?;

		value.set_sensitive(true);
		headers.insert(AUTHORIZATION, value);
	}

	Ok(PreparedRequest {
		method: descriptor.method().clone(),
		path: descriptor.path().to_owned(),
		headers,
		body: descriptor.body().to_vec(),
	})
}
