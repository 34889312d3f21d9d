//! The access/refresh credential pair owned by a [`CredentialStore`](crate::store::CredentialStore).

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Snapshot of the session credentials.
///
/// Values are only ever produced whole: a store hands out copies of the pair it holds, and the
/// pair is replaced or emptied as a unit, so a cleared refresh token never sits next to a stale
/// access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
}
impl Credentials {
	/// Builds a pair from an access credential and an optional refresh credential.
	pub fn new(access: impl Into<TokenSecret>, refresh: Option<TokenSecret>) -> Self {
		Self { access_token: Some(access.into()), refresh_token: refresh }
	}

	/// Returns a pair with both fields absent.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Short-lived credential attached to individual requests.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Longer-lived credential used solely to mint new access credentials.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Returns `true` when neither credential is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}
