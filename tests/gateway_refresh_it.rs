#![cfg(all(feature = "test", feature = "reqwest"))]

// crates.io
use httpmock::prelude::*;
// self
use gateway_client::{
	_preludet::*,
	auth::TokenSecret,
	envelope::ResponseEnvelope,
	store::MemoryStore,
};

async fn seeded_gateway(server: &MockServer) -> (ReqwestTestGateway, Arc<MemoryStore>) {
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());

	gateway
		.login_with("access-1", Some(TokenSecret::new("refresh-1")))
		.await
		.expect("Seeding credentials should succeed.");

	(gateway, store)
}

fn stored_pair(store: &MemoryStore) -> (Option<String>, Option<String>) {
	let snapshot = store.snapshot();

	(
		snapshot.access_token().map(|secret| secret.expose().to_owned()),
		snapshot.refresh_token().map(|secret| secret.expose().to_owned()),
	)
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (gateway, store) = seeded_gateway(&server).await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/helpers").header("authorization", "Bearer access-1");
			then.status(401).json_body(serde_json::json!({
				"success": false,
				"error": { "code": "TOKEN_EXPIRED", "message": "Access token expired." }
			}));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header_missing("authorization")
				.json_body(serde_json::json!({ "refresh_token": "refresh-1" }));
			then.status(200).delay(Duration::from_millis(300)).json_body(serde_json::json!({
				"success": true,
				"data": { "access_token": "access-2", "refresh_token": "refresh-2" }
			}));
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/helpers").header("authorization", "Bearer access-2");
			then.status(200).json_body(serde_json::json!({
				"success": true,
				"data": [{ "helper_id": "h1" }]
			}));
		})
		.await;
	let (first, second) =
		tokio::join!(gateway.get::<Value>("/helpers"), gateway.get::<Value>("/helpers"));

	for envelope in [first, second] {
		let envelope: ResponseEnvelope<Value> = envelope.expect("Retried request should succeed.");

		assert_eq!(envelope.data, Some(serde_json::json!([{ "helperId": "h1" }])));
	}

	expired.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;
	fresh.assert_calls_async(2).await;

	assert_eq!(stored_pair(&store), (Some("access-2".to_owned()), Some("refresh-2".to_owned())));
	assert_eq!(gateway.refresh_metrics().attempts(), 1);
	assert_eq!(gateway.refresh_metrics().joined(), 1);
}

#[tokio::test]
async fn second_unauthorized_response_is_final() {
	let server = MockServer::start_async().await;
	let (gateway, store) = seeded_gateway(&server).await;
	let helpers = server
		.mock_async(|when, then| {
			when.method(GET).path("/helpers");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(serde_json::json!({
				"success": true,
				"data": { "access_token": "access-2" }
			}));
		})
		.await;
	let err =
		gateway.get::<Value>("/helpers").await.expect_err("Second 401 should not be retried.");

	helpers.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(err.as_gateway().map(|gateway_err| gateway_err.status_code), Some(401));
	assert_eq!(stored_pair(&store), (Some("access-2".to_owned()), Some("refresh-1".to_owned())));
}

#[tokio::test]
async fn rejected_refresh_clears_the_session() {
	let server = MockServer::start_async().await;
	let (gateway, store) = seeded_gateway(&server).await;
	let helpers = server
		.mock_async(|when, then| {
			when.method(GET).path("/helpers");
			then.status(401).json_body(serde_json::json!({
				"success": false,
				"error": { "code": "TOKEN_EXPIRED", "message": "Access token expired." }
			}));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).json_body(serde_json::json!({
				"success": false,
				"error": { "code": "REFRESH_REVOKED", "message": "Refresh token revoked." }
			}));
		})
		.await;
	let err = gateway.get::<Value>("/helpers").await.expect_err("Session should be over.");
	let gateway_err = err.as_gateway().expect("Error should be a gateway error.");

	helpers.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(gateway_err.code, "TOKEN_EXPIRED");
	assert!(store.snapshot().is_empty());
	assert_eq!(gateway.refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn auth_endpoints_surface_unauthorized_without_refreshing() {
	let server = MockServer::start_async().await;
	let (gateway, store) = seeded_gateway(&server).await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401).json_body(serde_json::json!({
				"success": false,
				"error": { "code": "INVALID_CREDENTIALS", "message": "Wrong password." }
			}));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200);
		})
		.await;
	let err = gateway
		.post::<Value, _>("/auth/login", &serde_json::json!({ "email": "ops@example.com" }))
		.await
		.expect_err("Bad login should surface.");

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert_eq!(
		err.as_gateway().map(|gateway_err| gateway_err.code.as_str()),
		Some("INVALID_CREDENTIALS")
	);
	assert_eq!(stored_pair(&store), (Some("access-1".to_owned()), Some("refresh-1".to_owned())));
}

#[tokio::test]
async fn missing_refresh_credential_clears_without_calling_the_backend() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());

	gateway.login_with("access-1", None).await.expect("Seeding credentials should succeed.");

	let helpers = server
		.mock_async(|when, then| {
			when.method(GET).path("/helpers");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.path("/auth/refresh");
			then.status(200);
		})
		.await;

	gateway.get::<Value>("/helpers").await.expect_err("Session should be over.");

	helpers.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert!(store.snapshot().is_empty());
}
