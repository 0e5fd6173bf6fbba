//! run-relay server: POST /chat, answered asynchronously by callback.

use relay_api::config::RelayConfig;
use relay_api::server::{self, AppState};
use relay_callback::HttpCallbackSender;
use relay_coordinator::RequestCoordinator;
use relay_openai::OpenAiClientFactory;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env();
    if config.callback_rule.is_none() {
        tracing::warn!("no RELAY_CALLBACK_URL or RELAY_CALLBACK_HOST set; requests must carry callback_url");
    }

    let clients = Arc::new(OpenAiClientFactory::from_env());
    tracing::info!(base_url = %clients.base_url(), "job API client ready");
    let sender = Arc::new(HttpCallbackSender::new(config.callback_timeout));
    let coordinator = Arc::new(RequestCoordinator::new(
        clients,
        sender,
        config.coordinator.clone(),
    ));
    let state = Arc::new(AppState {
        coordinator,
        callback_rule: config.callback_rule.clone(),
    });

    let app = server::router(state);
    let addr: SocketAddr = config.listen.parse()?;
    tracing::info!("run-relay listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
