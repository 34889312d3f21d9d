//! Credential models: the access/refresh pair and the redacting secret wrapper.

pub mod credentials;
pub mod secret;

pub use credentials::*;
pub use secret::*;
