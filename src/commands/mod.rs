//! Command Handler Module
//!
//! This module implements the command processing layer for mcached.
//! It receives framed lines, runs them through the per-connection protocol
//! state machine, executes them against the storage engine, and returns
//! the response to send back.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Session      │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `get`, `set`, `delete`
//! - `incr`, `decr`
//! - `version`, `stats`, `quit`

pub mod handler;

// Re-export the main command handler
pub use handler::{
    Action, CommandHandler, PendingSet, ProtocolViolation, Session, SessionState,
    DEFAULT_MAX_ITEM_SIZE,
};
