use anyhow::{Context, Result};
use tracing::info;
use wsbridge::config::BridgeConfig;
use wsbridge::Bridge;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wsbridge=info".into()),
        )
        .init();

    info!("wsbridge starting...");

    let config = BridgeConfig::load().context("Failed to load configuration")?;

    info!(
        broker = %config.broker.url,
        topic = %config.broker.topic,
        listen = %config.listener.bind_addr(),
        max_clients = config.fanout.max_clients,
        "Configuration loaded"
    );

    let bridge = Bridge::start(config)
        .await
        .context("Failed to start bridge")?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    bridge.shutdown();

    Ok(())
}
