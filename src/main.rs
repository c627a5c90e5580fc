//! Gammon Relay Server
//!
//! Binary entry point: initializes logging, loads configuration from
//! the environment, and runs the WebSocket relay server.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gammon_relay::{RelayServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Gammon Relay Server v{}", VERSION);
    info!("Bind address: {}", config.bind_addr);
    info!("Grace window: {}s", config.grace_window.as_secs());

    let server = RelayServer::new(config);
    server.run().await?;

    Ok(())
}
