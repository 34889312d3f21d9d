//! Thread-safe in-memory [`CredentialStore`] implementation for tests and short-lived sessions.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	store::{CredentialStore, StoreFuture},
};

/// Keeps the credential pair in-process behind one lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Credentials>>);
impl MemoryStore {
	/// Creates a store seeded with `credentials`.
	pub fn with_credentials(credentials: Credentials) -> Self {
		Self(Arc::new(RwLock::new(credentials)))
	}

	/// Returns the current pair without going through the async contract.
	pub fn snapshot(&self) -> Credentials {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Credentials> {
		let pair = self.0.clone();

		Box::pin(async move { Ok(pair.read().clone()) })
	}

	fn set(&self, access: TokenSecret, refresh: Option<TokenSecret>) -> StoreFuture<'_, ()> {
		let pair = self.0.clone();

		Box::pin(async move {
			*pair.write() = Credentials::new(access, refresh);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let pair = self.0.clone();

		Box::pin(async move {
			*pair.write() = Credentials::empty();

			Ok(())
		})
	}
}
