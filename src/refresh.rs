//! Single-flight credential refresh.
//!
//! [`RefreshCoordinator::ensure_refreshed`] guarantees that at most one refresh call is in flight
//! per coordinator no matter how many requests hit a 401 at the same moment. The first caller
//! installs a shared [`OnceCell`] under a synchronous lock and drives the refresh; every caller
//! that arrives while the cell is installed awaits the same cell and observes the same outcome.
//! The cell is uninstalled as soon as the refresh settles, so a later, independent failure
//! starts a fresh attempt.
//!
//! Dropping the caller that drives a refresh hands the cell to the next waiter, which runs the
//! refresh itself. A cell nobody holds any more is orphaned: it no longer counts as in flight and
//! the next caller replaces it.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::GatewayConfig,
	error::{ConfigError, TransportError},
	http::{ACCEPT, GatewayHttpClient, JSON_MIME, Method, TransportRequest},
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	store::{CredentialStore, StoreError},
};

type RefreshSlot = Arc<OnceCell<bool>>;

/// Reasons a refresh operation resolves to `false`.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// No refresh credential is stored, so no call was made.
	#[error("No refresh credential is stored.")]
	MissingRefreshToken,
	/// Refresh endpoint answered with a non-2xx status.
	#[error("Refresh endpoint rejected the credential with HTTP {status}.")]
	Rejected {
		/// HTTP status of the refresh response.
		status: u16,
	},
	/// Refresh endpoint answered with a body that is not a refresh envelope.
	#[error("Refresh endpoint returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Refresh envelope reported failure or carried no access credential.
	#[error("Refresh endpoint did not return a new access credential.")]
	MissingAccessToken,
	/// Transport failure while calling the refresh endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Refresh endpoint URL could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential store failure while reading or writing the pair.
	#[error(transparent)]
	Storage(#[from] StoreError),
}

#[derive(Deserialize)]
struct RefreshEnvelope {
	success: bool,
	data: Option<RefreshGrant>,
}

#[derive(Deserialize)]
struct RefreshGrant {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Coordinates credential refreshes for one gateway client.
pub struct RefreshCoordinator<C>
where
	C: ?Sized + GatewayHttpClient,
{
	http_client: Arc<C>,
	store: Arc<dyn CredentialStore>,
	config: Arc<GatewayConfig>,
	metrics: RefreshMetrics,
	in_flight: Mutex<Option<RefreshSlot>>,
}
impl<C> RefreshCoordinator<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a coordinator that refreshes credentials held by `store`.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		store: Arc<dyn CredentialStore>,
		config: impl Into<Arc<GatewayConfig>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			config: config.into(),
			metrics: Default::default(),
			in_flight: Mutex::new(None),
		}
	}

	/// Counters describing this coordinator's refresh activity.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.in_flight.lock().as_ref().is_some_and(is_held)
	}

	/// Ensures the access credential is usable, refreshing it at most once per failure window.
	///
	/// Joins the refresh already in flight when there is one; otherwise starts exactly one.
	/// Resolves `true` once a new access credential has been stored. Any failure resolves
	/// `false` and leaves the store untouched.
	pub async fn ensure_refreshed(&self) -> bool {
		let slot = self.join_or_start();
		let mut ran = false;
		let refreshed = *slot
			.get_or_init(|| {
				ran = true;

				self.run(&slot)
			})
			.await;

		if !ran {
			self.metrics.record_joined();
			obs::record_op_outcome(GatewayOp::Refresh, OpOutcome::Joined);
		}

		refreshed
	}

	fn join_or_start(&self) -> RefreshSlot {
		let mut in_flight = self.in_flight.lock();

		if let Some(slot) = in_flight.as_ref().filter(|slot| is_held(slot)) {
			return slot.clone();
		}

		let slot = Arc::new(OnceCell::new());

		*in_flight = Some(slot.clone());

		slot
	}

	fn settle(&self, slot: &RefreshSlot) {
		let mut in_flight = self.in_flight.lock();

		if in_flight.as_ref().is_some_and(|current| Arc::ptr_eq(current, slot)) {
			*in_flight = None;
		}
	}

	async fn run(&self, slot: &RefreshSlot) -> bool {
		const OP: GatewayOp = GatewayOp::Refresh;

		let span = OpSpan::new(OP, "ensure_refreshed");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.rotate()).await;

		self.settle(slot);

		match result {
			Ok(()) => {
				self.metrics.record_success();
				obs::record_op_outcome(OP, OpOutcome::Success);

				true
			},
			Err(err) => {
				span.record_failure(&err);
				self.metrics.record_failure();
				obs::record_op_outcome(OP, OpOutcome::Failure);

				false
			},
		}
	}

	async fn rotate(&self) -> Result<(), RefreshError> {
		let current = self.store.get().await?;
		let refresh = current.refresh_token().cloned().ok_or(RefreshError::MissingRefreshToken)?;
		let body = serde_json::json!({ "refresh_token": refresh.expose() }).to_string();
		let request =
			TransportRequest::new(Method::Post, self.config.endpoint(&self.config.refresh_path)?)
				.header(ACCEPT, JSON_MIME)
				.json_body(body.into_bytes())
				.timeout(self.config.request_timeout);

		self.metrics.record_attempt();

		let response = self.http_client.send(request).await?;

		if !response.is_success() {
			return Err(RefreshError::Rejected { status: response.status });
		}

		let grant = parse_grant(&response.body)?;
		let next_refresh =
			grant.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new);

		self.store
			.set(TokenSecret::new(grant.access_token), Some(next_refresh.unwrap_or(refresh)))
			.await?;

		Ok(())
	}
}
impl<C> Debug for RefreshCoordinator<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh_path", &self.config.refresh_path)
			.field("refreshing", &self.is_refreshing())
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// A slot is held while some caller besides the coordinator owns a handle to it.
fn is_held(slot: &RefreshSlot) -> bool {
	Arc::strong_count(slot) > 1
}

fn parse_grant(body: &[u8]) -> Result<RefreshGrant, RefreshError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let envelope: RefreshEnvelope = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| RefreshError::MalformedResponse { source })?;

	match envelope {
		RefreshEnvelope { success: true, data: Some(grant) } if !grant.access_token.is_empty() =>
			Ok(grant),
		_ => Err(RefreshError::MissingAccessToken),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::Credentials,
		http::{TransportResponse, scripted::ScriptedHttpClient},
		store::MemoryStore,
	};

	const ROTATED: &str =
		r#"{"success":true,"data":{"access_token":"access-2","refresh_token":"refresh-2"}}"#;

	fn config() -> GatewayConfig {
		GatewayConfig::builder(
			Url::parse("https://api.example.com").expect("Failed to parse base URL fixture."),
		)
		.build()
		.expect("Config fixture should build.")
	}

	fn seeded_store() -> Arc<MemoryStore> {
		Arc::new(MemoryStore::with_credentials(Credentials::new(
			"access-1",
			Some(TokenSecret::new("refresh-1")),
		)))
	}

	fn coordinator(
		store: &Arc<MemoryStore>,
		status: u16,
		body: &'static str,
	) -> (RefreshCoordinator<ScriptedHttpClient>, Arc<ScriptedHttpClient>) {
		let http_client =
			Arc::new(ScriptedHttpClient::new(move |_| TransportResponse::new(status, body)));
		let store: Arc<dyn CredentialStore> = store.clone();

		(RefreshCoordinator::new(http_client.clone(), store, config()), http_client)
	}

	fn pair(store: &MemoryStore) -> (Option<String>, Option<String>) {
		let snapshot = store.snapshot();

		(
			snapshot.access_token().map(|secret| secret.expose().to_owned()),
			snapshot.refresh_token().map(|secret| secret.expose().to_owned()),
		)
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_refresh() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);
		let (first, second, third) = tokio::join!(
			coordinator.ensure_refreshed(),
			coordinator.ensure_refreshed(),
			coordinator.ensure_refreshed(),
		);

		assert!(first && second && third);
		assert_eq!(http_client.calls_to("/auth/refresh"), 1);
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().joined(), 2);
		assert_eq!(coordinator.metrics().successes(), 1);
		assert_eq!(pair(&store), (Some("access-2".to_owned()), Some("refresh-2".to_owned())));
	}

	#[tokio::test]
	async fn refresh_request_carries_the_refresh_credential_only() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);

		assert!(coordinator.ensure_refreshed().await);

		let requests = http_client.requests();
		let request = requests.first().expect("Refresh request should be recorded.");
		let body: Value = serde_json::from_slice(
			request.body.as_deref().expect("Refresh request should carry a body."),
		)
		.expect("Refresh body should be JSON.");

		assert_eq!(request.method, Method::Post);
		assert_eq!(body, serde_json::json!({ "refresh_token": "refresh-1" }));
		assert_eq!(request.header_value("authorization"), None);
	}

	#[tokio::test]
	async fn concurrent_failures_share_one_outcome() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 401, "{}");
		let (first, second) =
			tokio::join!(coordinator.ensure_refreshed(), coordinator.ensure_refreshed());

		assert!(!first && !second);
		assert_eq!(http_client.calls_to("/auth/refresh"), 1);
		assert_eq!(coordinator.metrics().failures(), 1);
		assert_eq!(pair(&store), (Some("access-1".to_owned()), Some("refresh-1".to_owned())));
	}

	#[tokio::test]
	async fn missing_refresh_credential_fails_without_network() {
		let store = Arc::new(MemoryStore::with_credentials(Credentials::new("access-1", None)));
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);

		assert!(!coordinator.ensure_refreshed().await);
		assert_eq!(http_client.calls_to("/auth/refresh"), 0);
		assert_eq!(coordinator.metrics().attempts(), 0);
		assert_eq!(coordinator.metrics().failures(), 1);
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn omitted_refresh_token_keeps_the_current_one() {
		let store = seeded_store();
		let (coordinator, _) =
			coordinator(&store, 200, r#"{"success":true,"data":{"access_token":"access-2"}}"#);

		assert!(coordinator.ensure_refreshed().await);
		assert_eq!(pair(&store), (Some("access-2".to_owned()), Some("refresh-1".to_owned())));
	}

	#[tokio::test]
	async fn malformed_or_unsuccessful_bodies_leave_the_store_untouched() {
		for body in [
			"not json",
			r#"{"success":true,"data":{"token":"x"}}"#,
			r#"{"success":false,"error":{"code":"EXPIRED","message":"Session expired."}}"#,
			r#"{"success":true,"data":{"access_token":""}}"#,
		] {
			let store = seeded_store();
			let (coordinator, _) = coordinator(&store, 200, body);

			assert!(!coordinator.ensure_refreshed().await, "Body {body} should fail refresh.");
			assert_eq!(pair(&store), (Some("access-1".to_owned()), Some("refresh-1".to_owned())));
		}
	}

	#[tokio::test]
	async fn cancelled_lone_refresh_is_not_left_in_flight() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);

		tokio::select! {
			biased;
			_ = coordinator.ensure_refreshed() => panic!("Refresh should still be in flight."),
			_ = tokio::task::yield_now() => {},
		}

		assert_eq!(http_client.calls_to("/auth/refresh"), 1);
		assert!(!coordinator.is_refreshing());
		assert!(coordinator.ensure_refreshed().await);
		assert_eq!(http_client.calls_to("/auth/refresh"), 2);
		assert_eq!(coordinator.metrics().joined(), 0);
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn cancelled_refresh_hands_over_to_a_waiting_caller() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);
		let mut waiter = Box::pin(coordinator.ensure_refreshed());

		tokio::select! {
			biased;
			_ = coordinator.ensure_refreshed() => panic!("Refresh should still be in flight."),
			_ = &mut waiter => panic!("Waiter should be blocked on the shared refresh."),
			_ = tokio::task::yield_now() => {},
		}

		assert!(coordinator.is_refreshing());
		assert!(waiter.await);
		assert_eq!(http_client.calls_to("/auth/refresh"), 2);
		assert_eq!(coordinator.metrics().joined(), 0);
		assert_eq!(coordinator.metrics().successes(), 1);
		assert!(!coordinator.is_refreshing());
		assert_eq!(pair(&store), (Some("access-2".to_owned()), Some("refresh-2".to_owned())));
	}

	#[tokio::test]
	async fn settled_refresh_allows_a_new_attempt() {
		let store = seeded_store();
		let (coordinator, http_client) = coordinator(&store, 200, ROTATED);

		assert!(coordinator.ensure_refreshed().await);
		assert!(!coordinator.is_refreshing());
		assert!(coordinator.ensure_refreshed().await);
		assert_eq!(http_client.calls_to("/auth/refresh"), 2);
		assert_eq!(coordinator.metrics().joined(), 0);
	}
}
