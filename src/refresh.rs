//! Refresh endpoint client.
//!
//! [`RefreshClient`] is the seam the coordinator calls exactly once per refresh cycle.
//! [`EndpointRefreshClient`] implements it by posting the current refresh token to the
//! configured path (`/auth/refresh` by default) through the same dispatcher as regular
//! traffic, as a public descriptor so it never carries a bearer nor re-enters the
//! coordinator.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenPair, TokenSecret},
	dispatch::Dispatcher,
	error::AuthExpiredReason,
	http::HttpTransport,
	request::RequestDescriptor,
};

/// Default refresh endpoint path.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Boxed future returned by [`RefreshClient::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenPair, RefreshError>> + 'a + Send>>;

/// Exchanges a refresh token for a new access/refresh pair.
///
/// Implementations perform a single attempt; the coordinator treats every error as terminal
/// for the current cycle and never retries.
pub trait RefreshClient
where
	Self: 'static + Send + Sync,
{
	/// Calls the refresh endpoint with `refresh_token`.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Failure modes of a refresh attempt.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the refresh token with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body decoded lossily as UTF-8.
		body: String,
	},
	/// The request could not be built or no response arrived (network, timeout).
	#[error("Refresh request failed.")]
	Request(#[source] Error),
	/// The endpoint returned a body that is not a token pair.
	#[error("Refresh endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The endpoint returned an empty token.
	#[error("Refresh endpoint returned an empty {field}.")]
	EmptyToken {
		/// Offending field.
		field: &'static str,
	},
}
impl From<&RefreshError> for AuthExpiredReason {
	fn from(err: &RefreshError) -> Self {
		match err {
			RefreshError::Rejected { status, .. } => Self::RefreshRejected { status: *status },
			RefreshError::Request(source) =>
				Self::RefreshFailed { message: format!("{err} {source}") },
			other => Self::RefreshFailed { message: other.to_string() },
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
	#[serde(alias = "access_token")]
	access_token: String,
	#[serde(alias = "refresh_token")]
	refresh_token: String,
}

/// [`RefreshClient`] that calls the backend's refresh endpoint over an [`HttpTransport`].
pub struct EndpointRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	dispatcher: Dispatcher<T>,
	path: String,
}
impl<T> EndpointRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client posting to `path` through `dispatcher`.
	pub fn new(dispatcher: Dispatcher<T>, path: impl Into<String>) -> Self {
		Self { dispatcher, path: path.into() }
	}

	/// Refresh endpoint path.
	pub fn path(&self) -> &str {
		&self.path
	}

	async fn exchange(&self, refresh_token: &TokenSecret) -> Result<TokenPair, RefreshError> {
		let descriptor = RequestDescriptor::new(Method::POST, self.path.as_str())
			.public()
			.with_json(&RefreshRequestBody { refresh_token: refresh_token.expose() })
			.map_err(|e| RefreshError::Request(e.into()))?;
		let response = self
			.dispatcher
			.dispatch(&descriptor, &Credentials::default())
			.await
			.map_err(RefreshError::Request)?;

		if !response.status().is_success() {
			return Err(RefreshError::Rejected {
				status: response.status().as_u16(),
				body: response.text(),
			});
		}

		parse_token_pair(response.body())
	}
}
impl<T> RefreshClient for EndpointRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(self.exchange(refresh_token))
	}
}
impl<T> Debug for EndpointRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EndpointRefreshClient")
			.field("path", &self.path)
			.field("dispatcher", &self.dispatcher)
			.finish()
	}
}

/// Parses `{accessToken, refreshToken}`, optionally wrapped in a `{"data": {...}}` envelope.
pub(crate) fn parse_token_pair(body: &[u8]) -> Result<TokenPair, RefreshError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let value: Value =
		serde_path_to_error::deserialize(&mut de).map_err(|source| RefreshError::Parse { source })?;
	let payload = match value {
		Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) =>
			map.remove("data").unwrap_or_default(),
		other => other,
	};
	let wire: RefreshResponseBody =
		serde_path_to_error::deserialize(payload).map_err(|source| RefreshError::Parse { source })?;
	let pair = TokenPair::new(wire.access_token, wire.refresh_token);

	if pair.access_token.is_empty() {
		return Err(RefreshError::EmptyToken { field: "accessToken" });
	}
	if pair.refresh_token.is_empty() {
		return Err(RefreshError::EmptyToken { field: "refreshToken" });
	}

	Ok(pair)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_flat_enveloped_and_snake_case_pairs() {
		for body in [
			r#"{"accessToken":"a","refreshToken":"r"}"#,
			r#"{"data":{"accessToken":"a","refreshToken":"r","user":{"id":1}}}"#,
			r#"{"access_token":"a","refresh_token":"r","expires_in":900}"#,
		] {
			let pair = parse_token_pair(body.as_bytes()).expect("Token pair should parse.");

			assert_eq!(pair, TokenPair::new("a", "r"));
		}
	}

	#[test]
	fn malformed_pairs_are_rejected() {
		let missing = parse_token_pair(br#"{"accessToken":"a"}"#)
			.expect_err("Missing refresh token should fail.");
		let empty = parse_token_pair(br#"{"accessToken":"","refreshToken":"r"}"#)
			.expect_err("Empty access token should fail.");
		let garbage = parse_token_pair(b"<html>").expect_err("Non-JSON should fail.");

		assert!(matches!(missing, RefreshError::Parse { .. }));
		assert!(matches!(empty, RefreshError::EmptyToken { field: "accessToken" }));

		let empty_refresh = parse_token_pair(br#"{"data":{"accessToken":"a","refreshToken":""}}"#)
			.expect_err("Empty refresh token should fail.");

		assert!(matches!(empty_refresh, RefreshError::EmptyToken { field: "refreshToken" }));
		assert!(matches!(garbage, RefreshError::Parse { .. }));
	}

	#[test]
	fn refresh_errors_map_to_expiry_reasons() {
		let rejected = RefreshError::Rejected { status: 401, body: String::new() };
		let failed = RefreshError::Request(Error::Timeout { timeout: Duration::from_secs(3) });

		assert_eq!(
			AuthExpiredReason::from(&rejected),
			AuthExpiredReason::RefreshRejected { status: 401 }
		);
		assert!(matches!(
			AuthExpiredReason::from(&failed),
			AuthExpiredReason::RefreshFailed { message } if message.contains("timed out")
		));
	}
}
