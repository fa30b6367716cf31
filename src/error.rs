//! Pipeline-level error types shared by the dispatcher, coordinator, and session facade.

// self
use crate::_prelude::*;

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error returned by [`perform_request`](crate::session::Session::perform_request).
///
/// Callers observe exactly one of a success response, [`Error::HttpStatus`] (or a transport
/// variant), or [`Error::AuthExpired`] per logical call; refresh and replay bookkeeping never
/// leaks through.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response reached the client (DNS, TCP, TLS, I/O).
	#[error("Network error occurred before a response was received.")]
	Network(#[source] TransportError),
	/// A single attempt exceeded the per-attempt budget.
	#[error("Request attempt timed out after {timeout:?}.")]
	Timeout {
		/// Budget that was exceeded.
		timeout: Duration,
	},
	/// Server answered with a non-success status the pipeline does not interpret.
	#[error("Server responded with HTTP {code}.")]
	HttpStatus {
		/// HTTP status code.
		code: u16,
		/// Response body decoded lossily as UTF-8.
		body: String,
	},
	/// The session can no longer be authenticated; the caller must sign in again.
	#[error("Session expired: {0}")]
	AuthExpired(AuthExpiredReason),
	/// A success payload could not be decoded into the requested type.
	#[error("Response payload could not be decoded.")]
	Decode {
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns `true` when the error requires the user to re-authenticate.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired(_))
	}

	/// Returns the HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::HttpStatus { code, .. } => Some(*code),
			Self::AuthExpired(AuthExpiredReason::RefreshRejected { status }) => Some(*status),
			_ => None,
		}
	}
}
impl From<AuthExpiredReason> for Error {
	fn from(reason: AuthExpiredReason) -> Self {
		Self::AuthExpired(reason)
	}
}

/// Why a session was declared expired.
///
/// Every reason is terminal for the current refresh cycle; the pipeline never retries an
/// expired session on its own.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthExpiredReason {
	/// No refresh token was available, so no refresh call was made.
	#[error("no refresh token is available.")]
	MissingRefreshToken,
	/// The refresh endpoint answered with a non-success status.
	#[error("the refresh endpoint rejected the refresh token with HTTP {status}.")]
	RefreshRejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// The refresh call failed before yielding a usable token pair.
	#[error("the refresh attempt failed: {message}")]
	RefreshFailed {
		/// Human-readable failure summary.
		message: String,
	},
	/// A request replayed with refreshed credentials was rejected again.
	#[error("the request was rejected again after replaying with a refreshed credential.")]
	ReplayRejected,
}

/// Configuration and validation failures raised while building sessions or requests.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL must use HTTPS unless insecure HTTP is explicitly allowed.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Base URL cannot carry request paths.
	#[error("The base URL cannot be used as a base: {url}.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// A configured path does not start with `/`.
	#[error("The {field} path must start with `/`: {path:?}.")]
	InvalidPath {
		/// Configuration field that failed validation.
		field: &'static str,
		/// Offending path.
		path: String,
	},
	/// Per-attempt timeout must be positive.
	#[error("The attempt timeout must be greater than zero.")]
	ZeroTimeout,
	/// Configuration document could not be parsed.
	#[error("Configuration could not be parsed.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	EncodeBody(#[from] serde_json::Error),
	/// A header value contains characters that are not allowed on the wire.
	#[error("The {header} header value is invalid.")]
	InvalidHeader {
		/// Header name.
		header: &'static str,
		/// Underlying validation failure.
		#[source]
		source: ::http::header::InvalidHeaderValue,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) reported by [`HttpTransport`](crate::http::HttpTransport)
/// implementations.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path that was being dispatched.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport enforced its own deadline and gave up.
	#[error("Transport deadline elapsed while calling {path}.")]
	TimedOut {
		/// Request path that was being dispatched.
		path: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn auth_expired_messages_name_the_reason() {
		let err = Error::from(AuthExpiredReason::RefreshRejected { status: 401 });

		assert!(err.is_auth_expired());
		assert_eq!(err.status(), Some(401));
		assert_eq!(
			err.to_string(),
			"Session expired: the refresh endpoint rejected the refresh token with HTTP 401."
		);
	}

	#[test]
	fn network_error_exposes_transport_source() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
		let err = Error::Network(TransportError::network("/orders", io));
		let source = StdError::source(&err).expect("Network error should expose its source.");

		assert_eq!(source.to_string(), "Network error occurred while calling /orders.");
		assert!(!err.is_auth_expired());
		assert_eq!(err.status(), None);
	}
}
