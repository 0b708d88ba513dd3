use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use courier::bus::{EventBus, RedisTransport};
use courier::channels::{ChannelRegistry, HttpChannelAdapter};
use courier::config::load_config;
use courier::gateway::{AppState, build_router, spawn_send_command_worker};
use courier::health::HealthAggregator;
use courier::model::ChannelType;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;

    let transport = RedisTransport::new(&config.bus.url)?;
    let bus = Arc::new(EventBus::new(Arc::new(transport)));

    let mut registry = ChannelRegistry::new();
    for channel in ChannelType::ALL {
        let url = config.channels.endpoint(channel).adapter_url.clone();
        registry.register(Arc::new(HttpChannelAdapter::new(channel, url)));
    }
    let registry = Arc::new(registry);

    let health = Arc::new(HealthAggregator::new(
        bus.clone(),
        registry.clone(),
        config.ai.service_url.clone(),
        Duration::from_secs(config.health.probe_timeout_secs),
    ));

    let state = AppState::new(&config, bus.clone(), registry.clone(), health);
    let app = build_router(state);

    let worker = spawn_send_command_worker(bus.clone(), registry).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("courier gateway v{} listening on {}", courier::VERSION, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    worker.abort();
    bus.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
