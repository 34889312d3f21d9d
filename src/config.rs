//! Gateway configuration: base URL, auth endpoints, and per-request timeout.

// self
use crate::{_prelude::*, error::ConfigError};

/// Errors raised while constructing or validating a [`GatewayConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum GatewayConfigError {
	/// Base URL must use HTTP(S).
	#[error("The base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:` URLs).
	#[error("The base URL cannot be used as a base: {url}.")]
	NotABase {
		/// Base URL that failed validation.
		url: String,
	},
	/// Configured paths must be absolute and more specific than `/`.
	#[error("The {field} must start with `/` and name a path below the root: {value}.")]
	InvalidPath {
		/// Which setting failed validation.
		field: &'static str,
		/// Supplied value.
		value: String,
	},
	/// A zero timeout would fail every request.
	#[error("The request timeout must be positive.")]
	ZeroTimeout,
}

/// Immutable gateway settings shared by the executor and refresh coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
	/// Backend base URL; request paths are appended to it.
	pub base_url: Url,
	/// Path of the credential refresh endpoint.
	pub refresh_path: String,
	/// Path prefix of credential/authorization endpoints, which never trigger a refresh.
	pub auth_path_prefix: String,
	/// Optional per-request timeout. `None` waits until the transport resolves or errors.
	pub request_timeout: Option<Duration>,
}
impl GatewayConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";
	/// Default auth endpoint prefix.
	pub const DEFAULT_AUTH_PATH_PREFIX: &'static str = "/auth/";

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Resolves a request path (optionally carrying a query string) against the base URL,
	/// keeping any path segment the base URL already has.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};

		Url::parse(&joined).map_err(|source| ConfigError::InvalidPath { path: path.into(), source })
	}

	/// Returns `true` for credential/authorization endpoints.
	pub fn is_auth_path(&self, path: &str) -> bool {
		let path = path.split(['?', '#']).next().unwrap_or(path);

		if path == self.refresh_path {
			return true;
		}

		let prefix = self.auth_path_prefix.trim_end_matches('/');

		match path.strip_prefix(prefix) {
			Some(rest) => rest.is_empty() || rest.starts_with('/'),
			None => false,
		}
	}

	fn validate(&self) -> Result<(), GatewayConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(GatewayConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.cannot_be_a_base() {
			return Err(GatewayConfigError::NotABase { url: self.base_url.to_string() });
		}
		if self.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(GatewayConfigError::ZeroTimeout);
		}

		validate_path("refresh path", &self.refresh_path)?;
		validate_path("auth path prefix", &self.auth_path_prefix)?;

		Ok(())
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Backend base URL.
	pub base_url: Url,
	/// Refresh endpoint path.
	pub refresh_path: String,
	/// Auth endpoint prefix.
	pub auth_path_prefix: String,
	/// Optional per-request timeout.
	pub request_timeout: Option<Duration>,
}
impl GatewayConfigBuilder {
	/// Creates a new builder seeded with the defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: GatewayConfig::DEFAULT_REFRESH_PATH.into(),
			auth_path_prefix: GatewayConfig::DEFAULT_AUTH_PATH_PREFIX.into(),
			request_timeout: None,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the auth endpoint prefix.
	pub fn auth_path_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.auth_path_prefix = prefix.into();

		self
	}

	/// Sets the per-request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let config = GatewayConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			auth_path_prefix: self.auth_path_prefix,
			request_timeout: self.request_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_path(field: &'static str, value: &str) -> Result<(), GatewayConfigError> {
	if value.starts_with('/') && !value.trim_matches('/').is_empty() {
		Ok(())
	} else {
		Err(GatewayConfigError::InvalidPath { field, value: value.into() })
	}
}
