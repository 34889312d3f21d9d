//! Gateway-level error types shared by the executor, refresh coordinator, and stores.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Backend answered with a non-2xx status after the retry policy was exhausted.
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	/// Transport failure before any response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Request or response body could not be translated.
	#[error(transparent)]
	Codec(#[from] CodecError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}
impl Error {
	/// Returns the backend error when the failure came from a non-2xx response.
	pub fn as_gateway(&self) -> Option<&GatewayError> {
		match self {
			Self::Gateway(err) => Some(err),
			_ => None,
		}
	}
}

/// Typed failure produced from a non-2xx backend response.
///
/// `code` and `message` come from the `{ "error": { "code", "message" } }` body when the backend
/// supplied one; otherwise they are synthesized from the HTTP status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Gateway returned HTTP {status_code} ({code}): {message}")]
pub struct GatewayError {
	/// HTTP status code of the failing response.
	pub status_code: u16,
	/// Backend error code, or [`GatewayError::UNKNOWN_CODE`].
	pub code: String,
	/// Human-readable message.
	pub message: String,
}
impl GatewayError {
	/// Code used when the backend body carries no usable error code.
	pub const UNKNOWN_CODE: &'static str = "UNKNOWN_ERROR";

	/// Builds an error with the generic code and a message derived from `status_code`.
	pub fn unknown(status_code: u16) -> Self {
		Self {
			status_code,
			code: Self::UNKNOWN_CODE.into(),
			message: Self::status_message(status_code),
		}
	}

	/// Parses the backend error body leniently, falling back field by field.
	pub fn from_body(status_code: u16, body: &[u8]) -> Self {
		#[derive(Deserialize)]
		struct ErrorBody {
			error: Option<ErrorFields>,
		}
		#[derive(Deserialize)]
		struct ErrorFields {
			code: Option<String>,
			message: Option<String>,
		}

		let Some(fields) =
			serde_json::from_slice::<ErrorBody>(body).ok().and_then(|parsed| parsed.error)
		else {
			return Self::unknown(status_code);
		};

		Self {
			status_code,
			code: fields
				.code
				.filter(|code| !code.is_empty())
				.unwrap_or_else(|| Self::UNKNOWN_CODE.into()),
			message: fields
				.message
				.filter(|message| !message.is_empty())
				.unwrap_or_else(|| Self::status_message(status_code)),
		}
	}

	/// Returns `true` for HTTP 401 failures.
	pub fn is_unauthorized(&self) -> bool {
		self.status_code == 401
	}

	fn status_message(status_code: u16) -> String {
		format!("Request failed with HTTP status {status_code}.")
	}
}

/// Body translation failures.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// Response body is not a valid response envelope.
	#[error("Response body is not a valid envelope (HTTP {status}).")]
	Envelope {
		/// Structured parsing failure including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status of the response.
		status: u16,
	},
	/// A 2xx envelope reported `success: false` without an `error` object.
	#[error("Response envelope reports failure without an error payload (HTTP {status}).")]
	MissingErrorPayload {
		/// HTTP status of the response.
		status: u16,
	},
	/// Caller-supplied request body could not be converted to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Gateway configuration failed validation.
	#[error(transparent)]
	InvalidConfig(#[from] crate::config::GatewayConfigError),
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
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

/// Transport-level failures (network, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the gateway.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The per-request timeout elapsed before a response arrived.
	#[error("Request timed out while calling the gateway.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn gateway_error_uses_backend_code_and_message() {
		let err = GatewayError::from_body(
			403,
			br#"{"success":false,"error":{"code":"FORBIDDEN","message":"No access to helper."}}"#,
		);

		assert_eq!(err.status_code, 403);
		assert_eq!(err.code, "FORBIDDEN");
		assert_eq!(err.message, "No access to helper.");
	}

	#[test]
	fn gateway_error_falls_back_on_malformed_body() {
		let err = GatewayError::from_body(502, b"<html>Bad Gateway</html>");

		assert_eq!(err, GatewayError::unknown(502));
		assert_eq!(err.code, GatewayError::UNKNOWN_CODE);
		assert!(err.message.contains("502"));
	}

	#[test]
	fn gateway_error_falls_back_per_missing_field() {
		let err = GatewayError::from_body(422, br#"{"error":{"code":"VALIDATION"}}"#);

		assert_eq!(err.code, "VALIDATION");
		assert!(err.message.contains("422"));

		let err = GatewayError::from_body(500, br#"{"error":{"message":"Boom."}}"#);

		assert_eq!(err.code, GatewayError::UNKNOWN_CODE);
		assert_eq!(err.message, "Boom.");
	}

	#[test]
	fn gateway_error_tolerates_empty_body() {
		let err = GatewayError::from_body(401, b"");

		assert!(err.is_unauthorized());
		assert_eq!(err.code, GatewayError::UNKNOWN_CODE);
	}

	#[test]
	fn error_exposes_gateway_variant() {
		let err: Error = GatewayError::unknown(404).into();

		assert_eq!(err.as_gateway().map(|inner| inner.status_code), Some(404));
		assert!(err.to_string().contains("404"));
	}
}
