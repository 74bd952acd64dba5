//! mcached - An In-Memory Cache Speaking the memcached Text Protocol
//!
//! This is the main entry point for the mcached server.
//! It parses the command line, sets up logging and runs the server until
//! Ctrl+C.

use anyhow::Context;
use clap::Parser;
use mcached::{Config, Server};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!("mcached v{}", mcached::VERSION);

    let server = Server::bind(config.clone())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    info!(
        max_item_size = config.max_item_size,
        idle_timeout_secs = config.idle_timeout,
        "Server started on {}",
        config.bind_address()
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    server.run(shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
