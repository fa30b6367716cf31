//! Immutable request descriptors and the public-path allowlist.

// crates.io
use ::http::header::{CONTENT_TYPE, HeaderName};
// self
use crate::{_prelude::*, error::ConfigError};

/// Description of one logical API call.
///
/// Descriptors are assembled with the consuming `with_*` helpers and then handed to the
/// session by value. The replay bit is never flipped in place: [`RequestDescriptor::replayed`]
/// returns a copy, so concurrent code paths cannot race on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
	method: Method,
	path: String,
	headers: HeaderMap,
	body: Vec<u8>,
	is_public: bool,
	retried: bool,
}
impl RequestDescriptor {
	/// Creates a protected descriptor for `path`, which is normalized to start with `/`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		let mut path = path.into();

		if !path.starts_with('/') {
			path.insert(0, '/');
		}

		Self {
			method,
			path,
			headers: HeaderMap::new(),
			body: Vec::new(),
			is_public: false,
			retried: false,
		}
	}

	/// Marks the descriptor as public; it will never carry a credential or trigger a refresh.
	pub fn public(self) -> Self {
		self.with_public(true)
	}

	/// Overrides the public flag.
	pub fn with_public(mut self, is_public: bool) -> Self {
		self.is_public = is_public;

		self
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON body and sets the content type.
	pub fn with_json<T>(self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload)?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}

	/// Returns a copy marked as replayed after a refresh.
	pub fn replayed(&self) -> Self {
		Self { retried: true, ..self.clone() }
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Request path relative to the session base URL (may carry a query string).
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Caller-supplied headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Request body; empty when none was set.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Whether the descriptor bypasses credential attachment and refresh.
	pub fn is_public(&self) -> bool {
		self.is_public
	}

	/// Whether the descriptor has already been replayed once.
	pub fn retried(&self) -> bool {
		self.retried
	}
}

/// Fixed set of path prefixes that never receive a credential and never trigger a refresh.
///
/// Matching is segment-aware: `/catalog` covers `/catalog`, `/catalog/42`, and
/// `/catalog?q=lamp`, but not `/catalogue`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicPaths(Vec<String>);
impl PublicPaths {
	/// Prefixes used when no allowlist is configured.
	pub const DEFAULT_PREFIXES: [&'static str; 6] =
		["/auth/login", "/auth/register", "/auth/refresh", "/auth/social", "/catalog", "/discovery"];

	/// Builds an allowlist from the provided prefixes.
	pub fn new<I, S>(prefixes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(prefixes.into_iter().map(Into::into).collect())
	}

	/// An allowlist that matches nothing.
	pub fn none() -> Self {
		Self(Vec::new())
	}

	/// Iterates over the configured prefixes.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Returns `true` when `path` falls under one of the prefixes.
	pub fn matches(&self, path: &str) -> bool {
		let path = path.split(['?', '#']).next().unwrap_or_default();

		self.0.iter().any(|prefix| {
			let prefix = prefix.trim_end_matches('/');

			if prefix.is_empty() {
				return true;
			}

			match path.strip_prefix(prefix) {
				Some(rest) => rest.is_empty() || rest.starts_with('/'),
				None => false,
			}
		})
	}
}
impl Default for PublicPaths {
	fn default() -> Self {
		Self::new(Self::DEFAULT_PREFIXES)
	}
}
