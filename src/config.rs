//! Session configuration with builder helpers and validation.

// self
use crate::{_prelude::*, error::ConfigError, refresh::DEFAULT_REFRESH_PATH, request::PublicPaths};

/// Settings shared by every request a [`Session`](crate::session::Session) performs.
///
/// Deserializes from JSON (see [`SessionConfig::from_json`]); only `base_url` is required:
///
/// ```json
/// { "base_url": "https://api.example.com/v1", "attempt_timeout_ms": 15000 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Base URL every request path is appended to.
	pub base_url: Url,
	/// Path of the refresh endpoint.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Path prefixes that bypass credential attachment and refresh.
	#[serde(default)]
	pub public_paths: PublicPaths,
	/// Budget applied to every individual attempt (original, refresh, replay).
	#[serde(default = "default_attempt_timeout", rename = "attempt_timeout_ms", with = "millis")]
	pub attempt_timeout: Duration,
	/// Permits a plain-HTTP base URL (local development and tests).
	#[serde(default)]
	pub allow_insecure_http: bool,
}
impl SessionConfig {
	/// Default per-attempt budget.
	pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

	/// Creates a configuration with defaults for everything but the base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: default_refresh_path(),
			public_paths: PublicPaths::default(),
			attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
			allow_insecure_http: false,
		}
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the refresh endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Replaces the public-path allowlist.
	pub fn with_public_paths(mut self, paths: PublicPaths) -> Self {
		self.public_paths = paths;

		self
	}

	/// Overrides the per-attempt budget.
	pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
		self.attempt_timeout = timeout;

		self
	}

	/// Allows or forbids a plain-HTTP base URL.
	pub fn allow_insecure_http(mut self, allow: bool) -> Self {
		self.allow_insecure_http = allow;

		self
	}

	/// Checks the configuration for values the pipeline cannot operate with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}

		match self.base_url.scheme() {
			"https" => {},
			"http" if self.allow_insecure_http => {},
			_ => return Err(ConfigError::InsecureBaseUrl { url: self.base_url.to_string() }),
		}

		ensure_absolute("refresh", &self.refresh_path)?;

		for prefix in self.public_paths.iter() {
			ensure_absolute("public", prefix)?;
		}

		if self.attempt_timeout.is_zero() {
			return Err(ConfigError::ZeroTimeout);
		}

		Ok(())
	}
}

fn ensure_absolute(field: &'static str, path: &str) -> Result<(), ConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(ConfigError::InvalidPath { field, path: path.to_owned() })
	}
}

fn default_refresh_path() -> String {
	DEFAULT_REFRESH_PATH.into()
}

fn default_attempt_timeout() -> Duration {
	SessionConfig::DEFAULT_ATTEMPT_TIMEOUT
}

mod millis {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Test URL should parse.")
	}

	#[test]
	fn json_defaults_fill_optional_fields() {
		let config = SessionConfig::from_json(r#"{"base_url":"https://api.example.com/v1"}"#)
			.expect("Minimal configuration should parse.");

		assert_eq!(config.refresh_path, "/auth/refresh");
		assert_eq!(config.public_paths, PublicPaths::default());
		assert_eq!(config.attempt_timeout, Duration::from_secs(30));
		assert!(!config.allow_insecure_http);
	}

	#[test]
	fn json_overrides_and_reports_paths() {
		let config = SessionConfig::from_json(
			r#"{"base_url":"https://api.example.com","public_paths":["/listings"],"attempt_timeout_ms":1500}"#,
		)
		.expect("Configuration with overrides should parse.");

		assert_eq!(config.attempt_timeout, Duration::from_millis(1500));
		assert!(config.public_paths.matches("/listings/9"));

		let err = SessionConfig::from_json(r#"{"base_url":"https://api.example.com","attempt_timeout_ms":"soon"}"#)
			.expect_err("A string timeout should fail to parse.");

		match err {
			ConfigError::Parse { source } =>
				assert_eq!(source.path().to_string(), "attempt_timeout_ms"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn validation_rejects_unusable_settings() {
		let insecure = SessionConfig::new(url("http://api.example.com"));

		assert!(matches!(insecure.validate(), Err(ConfigError::InsecureBaseUrl { .. })));
		assert!(insecure.clone().allow_insecure_http(true).validate().is_ok());

		let relative = SessionConfig::new(url("https://api.example.com")).with_refresh_path("auth/refresh");

		assert!(matches!(
			relative.validate(),
			Err(ConfigError::InvalidPath { field: "refresh", .. })
		));

		let zero = SessionConfig::new(url("https://api.example.com"))
			.with_attempt_timeout(Duration::ZERO);

		assert!(matches!(zero.validate(), Err(ConfigError::ZeroTimeout)));

		let opaque = SessionConfig::new(url("mailto:ops@example.com"));

		assert!(matches!(opaque.validate(), Err(ConfigError::InvalidBaseUrl { .. })));
	}
}
