//! Storage contracts and built-in store implementations for session credentials.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the session's access/refresh pair.
///
/// The pair is read, replaced, and emptied as a unit. Implementations guard both fields under a
/// single lock so concurrent readers never observe a half-updated pair, and expose no
/// operation that touches one field alone.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns a snapshot of the current pair.
	fn get(&self) -> StoreFuture<'_, Credentials>;

	/// Replaces both credentials.
	fn set(&self, access: TokenSecret, refresh: Option<TokenSecret>) -> StoreFuture<'_, ()>;

	/// Empties both credentials.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_gateway_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Gateway error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[tokio::test]
	async fn trait_objects_share_one_pair() {
		let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());

		store
			.set(TokenSecret::new("access-1"), Some(TokenSecret::new("refresh-1")))
			.await
			.expect("Setting credentials should succeed.");

		let other = store.clone();
		let snapshot = other.get().await.expect("Reading credentials should succeed.");

		assert_eq!(snapshot.access_token().map(TokenSecret::expose), Some("access-1"));
		assert_eq!(snapshot.refresh_token().map(TokenSecret::expose), Some("refresh-1"));
	}
}
