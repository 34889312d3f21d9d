//! Authenticated request execution with one refresh-driven retry.
//!
//! Every [`RequestExecutor`] entry point sends the request with the stored bearer credential and,
//! when the backend answers `401` outside the auth endpoints, asks the shared
//! [`RefreshCoordinator`] for a fresh credential and replays the request exactly once.

// self
use crate::{
	_prelude::*,
	case::{self, Direction},
	config::GatewayConfig,
	envelope::ResponseEnvelope,
	error::{CodecError, GatewayError},
	http::{
		ACCEPT, AUTHORIZATION, GatewayHttpClient, JSON_MIME, Method, TransportRequest,
		TransportResponse,
	},
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	refresh::RefreshCoordinator,
	store::CredentialStore,
};

/// Method, path, and optional JSON body of a gateway call.
///
/// The body is sent as-is; callers that want snake_case keys on the wire transform it before
/// building the descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	/// HTTP verb.
	pub method: Method,
	/// Path relative to the configured base URL, optionally with a query string.
	pub path: String,
	/// JSON body.
	pub body: Option<Value>,
}
impl RequestDescriptor {
	/// Creates a body-less descriptor.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: None }
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attempt {
	First,
	Retry,
}
impl Attempt {
	const fn op(self) -> GatewayOp {
		match self {
			Attempt::First => GatewayOp::Request,
			Attempt::Retry => GatewayOp::Retry,
		}
	}
}

/// Sends gateway requests on behalf of [`ApiGateway`](crate::gateway::ApiGateway).
pub struct RequestExecutor<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	store: Arc<dyn CredentialStore>,
	config: Arc<GatewayConfig>,
	refresher: RefreshCoordinator<C>,
}
impl<C> RequestExecutor<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates an executor whose refresh coordinator shares the same transport, store, and
	/// configuration.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		store: Arc<dyn CredentialStore>,
		config: impl Into<Arc<GatewayConfig>>,
	) -> Self {
		let http_client = http_client.into();
		let config = config.into();
		let refresher = RefreshCoordinator::new(http_client.clone(), store.clone(), config.clone());

		Self { http_client, store, config, refresher }
	}

	/// Refresh coordinator used on `401` responses.
	pub fn refresher(&self) -> &RefreshCoordinator<C> {
		&self.refresher
	}

	/// Gateway configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Credential store the executor reads bearer credentials from.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Executes `descriptor` and decodes the camelCase-converted response envelope.
	pub async fn execute<T>(&self, descriptor: &RequestDescriptor) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.dispatch(descriptor).await?;

		Ok(decode_envelope(response, Some(Direction::Inbound))?)
	}

	/// Executes `descriptor` and decodes the response envelope without rewriting keys.
	pub async fn execute_raw<T>(
		&self,
		descriptor: &RequestDescriptor,
	) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.dispatch(descriptor).await?;

		Ok(decode_envelope(response, None)?)
	}

	/// Executes `descriptor` and returns the response body untouched.
	pub async fn execute_bytes(&self, descriptor: &RequestDescriptor) -> Result<Vec<u8>> {
		Ok(self.dispatch(descriptor).await?.body)
	}

	/// Sends the request, applies the refresh-and-retry policy, and maps non-2xx statuses to
	/// [`GatewayError`].
	///
	/// A `401` on the first attempt triggers [`RefreshCoordinator::ensure_refreshed`] unless the
	/// path is an auth endpoint. A successful refresh replays the request once and its response is
	/// final, even when it is another `401`. A failed refresh clears the store and surfaces the
	/// original `401`, even when clearing the store fails.
	async fn dispatch(&self, descriptor: &RequestDescriptor) -> Result<TransportResponse> {
		let mut response = self.send(descriptor, Attempt::First).await?;

		if response.status == 401 && !self.config.is_auth_path(&descriptor.path) {
			if self.refresher.ensure_refreshed().await {
				response = self.send(descriptor, Attempt::Retry).await?;
			} else if let Err(err) = self.store.clear().await {
				OpSpan::new(GatewayOp::Refresh, "clear_credentials").record_failure(&err);
			}
		}
		if !response.is_success() {
			return Err(GatewayError::from_body(response.status, &response.body).into());
		}

		Ok(response)
	}

	async fn send(
		&self,
		descriptor: &RequestDescriptor,
		attempt: Attempt,
	) -> Result<TransportResponse> {
		let op = attempt.op();
		let span = OpSpan::new(op, descriptor.method.as_str());

		obs::record_op_outcome(op, OpOutcome::Attempt);

		match span.instrument(self.send_inner(descriptor)).await {
			Ok(response) => {
				if response.is_success() {
					obs::record_op_outcome(op, OpOutcome::Success);
				} else {
					span.record_failure(&format_args!("HTTP {}", response.status));
					obs::record_op_outcome(op, OpOutcome::Failure);
				}

				Ok(response)
			},
			Err(err) => {
				span.record_failure(&err);
				obs::record_op_outcome(op, OpOutcome::Failure);

				Err(err)
			},
		}
	}

	async fn send_inner(&self, descriptor: &RequestDescriptor) -> Result<TransportResponse> {
		let credentials = self.store.get().await?;
		let mut request =
			TransportRequest::new(descriptor.method, self.config.endpoint(&descriptor.path)?)
				.header(ACCEPT, JSON_MIME)
				.timeout(self.config.request_timeout);

		if let Some(access) = credentials.access_token() {
			request = request.header(AUTHORIZATION, access.bearer());
		}
		if let Some(body) = &descriptor.body {
			request = request.json_body(body.to_string().into_bytes());
		}

		Ok(self.http_client.send(request).await?)
	}
}
impl<C> Debug for RequestExecutor<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresher", &self.refresher)
			.finish()
	}
}

/// Decodes a 2xx response into an envelope, rewriting keys in `direction` first when provided.
fn decode_envelope<T>(
	response: TransportResponse,
	direction: Option<Direction>,
) -> Result<ResponseEnvelope<T>, CodecError>
where
	T: DeserializeOwned,
{
	let status = response.status;

	if status == 204 {
		return Ok(ResponseEnvelope::no_content());
	}

	let mut de = serde_json::Deserializer::from_slice(&response.body);
	let value: Value = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| CodecError::Envelope { source, status })?;
	let value = match direction {
		Some(direction) => case::to_convention(value, direction),
		None => value,
	};
	let envelope: ResponseEnvelope<T> = serde_path_to_error::deserialize(value)
		.map_err(|source| CodecError::Envelope { source, status })?;

	envelope.validate(status)
}
