//! TCP Server
//!
//! Binds the listener, owns the shared storage engine and stats, starts the
//! expiry sweeper and spawns one task per accepted connection until the
//! shutdown future completes.

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::handle_connection;
use crate::stats::Stats;
use crate::storage::{ExpirySweeper, StorageEngine};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// A bound mcached server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<Stats>,
    config: Config,
}

impl Server {
    /// Binds the listener described by `config`.
    pub async fn bind(config: Config) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;

        Ok(Self {
            listener,
            storage: Arc::new(StorageEngine::new()),
            stats: Arc::new(Stats::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Serves connections until `shutdown` completes, then stops the sweeper.
    ///
    /// Connections already open keep running until their clients leave.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let sweeper = ExpirySweeper::start(Arc::clone(&self.storage), self.config.expiry_config());

        let handler = CommandHandler::new(Arc::clone(&self.storage), Arc::clone(&self.stats))
            .with_max_item_size(self.config.max_item_size);

        if let Ok(addr) = self.local_addr() {
            info!(addr = %addr, "Listening for connections");
        }

        tokio::select! {
            _ = accept_loop(&self.listener, handler, Arc::clone(&self.stats), self.config.idle_timeout()) => {}
            _ = shutdown => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        sweeper.stop();
    }
}

/// Accepts connections forever, spawning a handler task for each.
async fn accept_loop(
    listener: &TcpListener,
    handler: CommandHandler,
    stats: Arc<Stats>,
    idle_timeout: Option<Duration>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    error!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }

                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats, idle_timeout).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
