//! # mcached - An In-Memory Cache Speaking the memcached Text Protocol
//!
//! mcached keeps opaque byte payloads under short keys, with per-entry flags
//! and optional expiry, and serves them over TCP using the line-oriented
//! memcached text protocol.
//!
//! ## Features
//!
//! - **memcached-compatible**: `get`, `set`, `delete`, `incr`, `decr`,
//!   `version`, `stats` and `quit`, with `noreply`
//! - **Concurrent**: Sharded storage with RwLock for concurrent access
//! - **TTL Support**: Relative or absolute expiry with lazy and active cleanup
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              mcached                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │──> Stats         │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │              StorageEngine                   │   │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...64   │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use mcached::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(Config::default()).await?;
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line framing, command parsing and reply types
//! - [`storage`]: Thread-safe entry store with TTL support and the sweeper
//! - [`commands`]: Per-connection session state machine and command execution
//! - [`connection`]: Client connection management
//! - [`stats`]: Process-wide counters behind the `stats` command
//! - [`server`]: Accept loop and shutdown
//! - [`config`]: Command-line configuration
//!
//! ## Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A background task periodically removes expired keys

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Session};
pub use config::Config;
pub use connection::handle_connection;
pub use protocol::{Command, LineParser, ParseError, Response};
pub use server::Server;
pub use stats::Stats;
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port mcached listens on (same as memcached)
pub const DEFAULT_PORT: u16 = 11211;

/// The default address mcached binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of mcached
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
