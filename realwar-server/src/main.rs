//! RealWar Arena Server
//!
//! Binds the WebSocket gateway and runs a single arena until Ctrl-C.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use realwar::{
    TICK_RATE, VERSION,
    network::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    info!("RealWar Server v{}", VERSION);
    info!("Tick Rate: {} Hz (default {})", config.arena.tick_rate, TICK_RATE);
    info!(
        "Arena: {}x{}, win at {} units",
        config.arena.width, config.arena.height, config.arena.win_units
    );

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
