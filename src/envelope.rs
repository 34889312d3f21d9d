//! The `{ success, data, error }` wrapper every non-raw backend response conforms to.

// self
use crate::{_prelude::*, error::CodecError};

/// Standard response wrapper returned by the gateway verbs.
///
/// A failed envelope (`success == false`) always carries `error`; decoding rejects bodies that
/// break this rule. A `204 No Content` response maps to [`ResponseEnvelope::no_content`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
	/// Whether the backend reports the operation as successful.
	pub success: bool,
	/// Payload, absent for 204 responses and for payload-less successes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	/// In-band error details.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<EnvelopeError>,
}
impl<T> ResponseEnvelope<T> {
	/// Envelope produced for `204 No Content`.
	pub fn no_content() -> Self {
		Self { success: true, data: None, error: None }
	}

	/// Consumes the envelope and returns its payload, if any.
	pub fn into_data(self) -> Option<T> {
		self.data
	}

	pub(crate) fn validate(self, status: u16) -> Result<Self, CodecError> {
		if !self.success && self.error.is_none() {
			return Err(CodecError::MissingErrorPayload { status });
		}

		Ok(self)
	}
}

/// Error object embedded in a [`ResponseEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
	/// Backend error code.
	pub code: String,
	/// Human-readable message.
	pub message: String,
}
