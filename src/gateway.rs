//! Caller-facing gateway facade.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	case,
	config::GatewayConfig,
	envelope::ResponseEnvelope,
	error::CodecError,
	executor::{RequestDescriptor, RequestExecutor},
	http::{GatewayHttpClient, Method},
	refresh::RefreshMetrics,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = ApiGateway<ReqwestHttpClient>;

/// Authenticated client for a JSON gateway backend.
///
/// Callers speak camelCase: bodies passed to [`post`](Self::post), [`put`](Self::put), and
/// [`patch`](Self::patch) are serialized and rewritten to snake_case before sending, and every
/// envelope is rewritten back to camelCase before it is decoded into `T`. The `raw_*` verbs and
/// [`download`](Self::download) skip both rewrites.
///
/// Clones share one executor, so they share the credential store and the single-flight refresh.
pub struct ApiGateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	executor: Arc<RequestExecutor<C>>,
}
impl<C> ApiGateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a gateway that reuses the caller-provided transport.
	pub fn with_http_client(
		config: GatewayConfig,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self { executor: Arc::new(RequestExecutor::new(http_client, store, config)) }
	}

	/// Issues `GET path`.
	pub async fn get<T>(&self, path: &str) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.executor.execute(&RequestDescriptor::new(Method::Get, path)).await
	}

	/// Issues `POST path` with `body` rewritten to snake_case.
	pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.send_with_body(Method::Post, path, body).await
	}

	/// Issues `PUT path` with `body` rewritten to snake_case.
	pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.send_with_body(Method::Put, path, body).await
	}

	/// Issues `PATCH path` with `body` rewritten to snake_case.
	pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.send_with_body(Method::Patch, path, body).await
	}

	/// Issues `DELETE path`.
	pub async fn delete<T>(&self, path: &str) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.executor.execute(&RequestDescriptor::new(Method::Delete, path)).await
	}

	/// Issues `GET path` without rewriting keys.
	pub async fn raw_get<T>(&self, path: &str) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.raw_request(Method::Get, path, None).await
	}

	/// Issues `POST path` with `body` sent as-is and the response decoded without rewriting keys.
	pub async fn raw_post<T>(&self, path: &str, body: Value) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.raw_request(Method::Post, path, Some(body)).await
	}

	/// Issues any verb without rewriting keys in either direction.
	pub async fn raw_request<T>(
		&self,
		method: Method,
		path: &str,
		body: Option<Value>,
	) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		let mut descriptor = RequestDescriptor::new(method, path);

		descriptor.body = body;

		self.executor.execute_raw(&descriptor).await
	}

	/// Issues `GET path` and returns the body bytes (exports and other non-envelope payloads).
	pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
		self.executor.execute_bytes(&RequestDescriptor::new(Method::Get, path)).await
	}

	/// Stores a credential pair obtained out of band (for example from a login response).
	pub async fn login_with(
		&self,
		access: impl Into<TokenSecret>,
		refresh: Option<TokenSecret>,
	) -> Result<()> {
		Ok(self.executor.store().set(access.into(), refresh).await?)
	}

	/// Clears the stored credential pair.
	pub async fn logout(&self) -> Result<()> {
		Ok(self.executor.store().clear().await?)
	}

	/// Returns the stored credential pair.
	pub async fn credentials(&self) -> Result<Credentials> {
		Ok(self.executor.store().get().await?)
	}

	/// Counters describing refresh activity across every clone of this gateway.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.executor.refresher().metrics()
	}

	/// Gateway configuration.
	pub fn config(&self) -> &GatewayConfig {
		self.executor.config()
	}

	/// Underlying executor.
	pub fn executor(&self) -> &RequestExecutor<C> {
		&self.executor
	}

	async fn send_with_body<T, B>(
		&self,
		method: Method,
		path: &str,
		body: &B,
	) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(|source| CodecError::RequestBody { source })?;
		let descriptor = RequestDescriptor::new(method, path).with_body(case::to_wire(body));

		self.executor.execute(&descriptor).await
	}
}
#[cfg(feature = "reqwest")]
impl ApiGateway<ReqwestHttpClient> {
	/// Creates a gateway backed by a default reqwest client.
	///
	/// Use [`ApiGateway::with_http_client`] to supply a client with custom TLS, proxy, or pool
	/// settings.
	pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Self {
		Self::with_http_client(config, store, ReqwestHttpClient::default())
	}
}
impl<C> Clone for ApiGateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn clone(&self) -> Self {
		Self { executor: self.executor.clone() }
	}
}
impl<C> Debug for ApiGateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiGateway").field("executor", &self.executor).finish()
	}
}
