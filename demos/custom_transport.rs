//! Demonstrates plugging a non-reqwest transport into the gateway.
//!
//! 1. Implement [`GatewayHttpClient`] and return a [`TransportResponse`] for every HTTP status.
//! 2. Report failures that happen before a response exists as [`TransportError`].
//! 3. Pass the transport to [`ApiGateway::with_http_client`].

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
};
// crates.io
use color_eyre::Result;
use serde_json::Value;
// self
use gateway_client::{
	config::GatewayConfig,
	error::{Error, TransportError},
	gateway::ApiGateway,
	http::{GatewayHttpClient, TransportFuture, TransportRequest, TransportResponse},
	store::{CredentialStore, MemoryStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config =
		GatewayConfig::builder(Url::parse("https://dashboard.example.com/api")?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let gateway = <ApiGateway<CannedHttpClient>>::with_http_client(
		config.clone(),
		Arc::clone(&store),
		CannedHttpClient::Online,
	);
	let envelope = gateway.get::<Value>("/stats/daily").await?;

	println!("Canned stats: {:?}.", envelope.into_data());

	let offline = <ApiGateway<CannedHttpClient>>::with_http_client(
		config,
		store,
		CannedHttpClient::Offline { host: "dashboard.example.com" },
	);

	match offline.get::<Value>("/stats/daily").await {
		Err(Error::Transport(err)) => println!("Transport failure surfaced: {err}."),
		other => println!("Unexpected outcome: {other:?}."),
	}

	Ok(())
}

/// Transport that answers from memory instead of the network.
enum CannedHttpClient {
	Online,
	Offline { host: &'static str },
}
impl GatewayHttpClient for CannedHttpClient {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_, TransportResponse> {
		Box::pin(async move {
			match self {
				Self::Online => Ok(TransportResponse::new(
					200,
					format!(
						r#"{{"success":true,"data":{{"requested_path":"{}","active_helpers":3}}}}"#,
						request.url.path()
					),
				)),
				Self::Offline { host } =>
					Err(TransportError::network(DnsFailure { host: (*host).to_owned() })),
			}
		})
	}
}

#[derive(Debug)]
struct DnsFailure {
	host: String,
}
impl Display for DnsFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Failed to resolve {}.", self.host)
	}
}
impl StdError for DnsFailure {}
