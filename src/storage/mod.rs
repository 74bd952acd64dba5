//! Storage Engine Module
//!
//! This module provides the entry store for mcached: a thread-safe, sharded
//! key-value map with TTL support, and a background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ sweep(now, max_keys)
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use mcached::storage::{ArithOp, ArithOutcome, Expiry, StorageEngine};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! let r = engine.set(Bytes::from("hits"), 0, Expiry::After(Duration::from_secs(60)), 1);
//! engine.fill_payload(b"hits", r.generation, b"5");
//!
//! assert_eq!(engine.incr_decr(b"hits", 3, ArithOp::Incr), ArithOutcome::Value(8));
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::{
    unix_now, ArithOp, ArithOutcome, Entry, Expiry, FillOutcome, Item, Reservation,
    StorageEngine, StoreSnapshot,
};
pub use expiry::{ExpiryConfig, ExpirySweeper};
