use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use assure_gateway::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assure_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("ASSURE_CONFIG").unwrap_or_else(|_| "config/assure.toml".to_string());
    let config = assure_core::config::AssureConfig::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        assure_core::config::AssureConfig::default()
    });

    let bind = config.gateway.bind_addr.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config).await?);
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("assure gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
