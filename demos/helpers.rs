//! Demonstrates the gateway against a mocked backend: a camelCase helper payload goes out as
//! snake_case, an expired access credential is refreshed once, and the request is replayed.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::{Deserialize, Serialize};
// self
use gateway_client::{
	auth::TokenSecret,
	config::GatewayConfig,
	gateway::ApiGateway,
	http::ReqwestHttpClient,
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateHelper {
	display_name: String,
	system_prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Helper {
	helper_id: String,
	display_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(POST).path("/helpers").header("authorization", "Bearer stale-access");
			then.status(401).json_body(serde_json::json!({
				"success": false,
				"error": { "code": "TOKEN_EXPIRED", "message": "Access token expired." }
			}));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).json_body(serde_json::json!({
				"success": true,
				"data": { "access_token": "fresh-access", "refresh_token": "fresh-refresh" }
			}));
		})
		.await;
	let created = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/helpers")
				.header("authorization", "Bearer fresh-access")
				.json_body(serde_json::json!({
					"display_name": "Reviewer",
					"system_prompt": "Review pull requests."
				}));
			then.status(201).json_body(serde_json::json!({
				"success": true,
				"data": { "helper_id": "h1", "display_name": "Reviewer" }
			}));
		})
		.await;
	let config = GatewayConfig::builder(Url::parse(&server.base_url())?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let http_client = ReqwestHttpClient::with_client(Client::builder().build()?);
	let gateway = <ApiGateway<ReqwestHttpClient>>::with_http_client(config, store, http_client);

	gateway.login_with("stale-access", Some(TokenSecret::new("stale-refresh"))).await?;

	let envelope = gateway
		.post::<Helper, _>(
			"/helpers",
			&CreateHelper {
				display_name: "Reviewer".into(),
				system_prompt: "Review pull requests.".into(),
			},
		)
		.await?;

	if let Some(helper) = envelope.into_data() {
		println!("Created helper {} ({}).", helper.helper_id, helper.display_name);
	}

	println!("Refresh calls sent: {}.", gateway.refresh_metrics().attempts());

	expired.assert_async().await;
	refresh.assert_async().await;
	created.assert_async().await;

	Ok(())
}
