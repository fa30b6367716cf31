//! Transport primitives for the request pipeline.
//!
//! The module exposes [`HttpTransport`], the pipeline's only dependency on an HTTP stack,
//! alongside the buffered [`HttpResponse`] it produces. Implementations only move bytes:
//! credential attachment, timeouts, and refresh handling live above this seam, so a
//! transport never retries and never inspects status codes.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, attach::PreparedRequest, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::SessionConfig, error::ConfigError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing prepared requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// dispatcher and the refresh endpoint client behind one `Arc`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the full response.
	///
	/// Any response that arrives (including `401` and `5xx`) must be returned as `Ok`; only
	/// failures that prevent a response from arriving map to [`TransportError`].
	fn send(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// Fully buffered HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Convenience constructor without headers.
	pub fn with_status(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self::new(status, HeaderMap::new(), body)
	}

	/// Response status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw response body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Consumes the response and returns the raw body.
	pub fn into_body(self) -> Vec<u8> {
		self.body
	}

	/// Body decoded lossily as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns `true` for the authorization-failure status (`401`).
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { source })
	}
}

/// Thin wrapper around [`ReqwestClient`] that resolves request paths against a base URL.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Creates a transport with a default reqwest client.
	pub fn new(base_url: Url) -> Self {
		Self::with_client(ReqwestClient::default(), base_url)
	}

	/// Builds a transport for `config`, bounding connection setup by the per-attempt budget.
	pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().connect_timeout(config.attempt_timeout).build()?;

		Ok(Self::with_client(client, config.base_url.clone()))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	/// Base URL every request path is appended to.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn resolve(&self, path: &str) -> Result<Url, TransportError> {
		let joined = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));

		Url::parse(&joined).map_err(|e| TransportError::network(path, e))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: PreparedRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let PreparedRequest { method, path, headers, body } = request;
			let url = self.resolve(&path)?;
			let mut builder = self.client.request(method, url).headers(headers);

			if !body.is_empty() {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(|e| map_reqwest_error(&path, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| map_reqwest_error(&path, e))?;

			Ok(HttpResponse::new(status, headers, body.to_vec()))
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		TransportError::TimedOut { path: path.to_owned() }
	} else {
		TransportError::network(path, err)
	}
}
