//! Access/refresh credential snapshots.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Complete access/refresh pair issued by sign-in or a refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Bearer credential attached to protected requests.
	pub access_token: TokenSecret,
	/// Secret exchanged at the refresh endpoint for a new pair.
	pub refresh_token: TokenSecret,
}
impl TokenPair {
	/// Creates a pair from raw token values.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}
}

/// Immutable credential snapshot held by the [`CredentialStore`](crate::store::CredentialStore).
///
/// Both halves are optional: a signed-out session has neither, and a session restored from
/// storage may carry only a refresh token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
	/// Current bearer credential, if any.
	pub access_token: Option<TokenSecret>,
	/// Current refresh secret, if any.
	pub refresh_token: Option<TokenSecret>,
}
impl Credentials {
	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Returns the bearer value, if any. Callers must avoid logging it.
	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_ref().map(TokenSecret::expose)
	}

	/// Returns the refresh value, if any. Callers must avoid logging it.
	pub fn refresh_token(&self) -> Option<&str> {
		self.refresh_token.as_ref().map(TokenSecret::expose)
	}

	/// Returns `true` when `other` holds a different, present access token.
	///
	/// Used to detect that a rejected attempt was sent with a credential that has since been
	/// replaced.
	pub fn supersedes(&self, other: &Credentials) -> bool {
		self.access_token.is_some() && self.access_token != other.access_token
	}
}
impl From<TokenPair> for Credentials {
	fn from(pair: TokenPair) -> Self {
		Self { access_token: Some(pair.access_token), refresh_token: Some(pair.refresh_token) }
	}
}
