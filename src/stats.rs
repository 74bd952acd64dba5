//! Process-Wide Statistics
//!
//! Atomic counters shared by every connection task and read by the `stats`
//! command. Counters use relaxed ordering: each one is exact on its own, a
//! snapshot across several of them is not atomic.

use crate::storage::{unix_now, StoreSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Shared server counters.
#[derive(Debug)]
pub struct Stats {
    /// When the server started
    started: Instant,
    /// Total number of connections accepted
    total_connections: AtomicU64,
    /// Currently open connections
    curr_connections: AtomicU64,
    /// GET commands, including ones refused for bad arguments
    cmd_get: AtomicU64,
    /// Well-formed SET commands
    cmd_set: AtomicU64,
    get_hits: AtomicU64,
    get_misses: AtomicU64,
    /// Keys created by SET that did not exist before
    total_items: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_connections: AtomicU64::new(0),
            curr_connections: AtomicU64::new(0),
            cmd_get: AtomicU64::new(0),
            cmd_set: AtomicU64::new(0),
            get_hits: AtomicU64::new(0),
            get_misses: AtomicU64::new(0),
            total_items: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.curr_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.curr_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a GET and whether it hit.
    pub fn record_get(&self, hit: bool) {
        self.cmd_get.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.get_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.get_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a GET refused before reaching the store.
    pub fn record_rejected_get(&self) {
        self.cmd_get.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a SET; `new_key` feeds `total_items`.
    pub fn record_set(&self, new_key: bool) {
        self.cmd_set.fetch_add(1, Ordering::Relaxed);
        if new_key {
            self.total_items.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Seconds since the server started.
    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Takes a snapshot of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.uptime(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            curr_connections: self.curr_connections.load(Ordering::Relaxed),
            cmd_get: self.cmd_get.load(Ordering::Relaxed),
            cmd_set: self.cmd_set.load(Ordering::Relaxed),
            get_hits: self.get_hits.load(Ordering::Relaxed),
            get_misses: self.get_misses.load(Ordering::Relaxed),
            total_items: self.total_items.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A copy of the counters at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: u64,
    pub total_connections: u64,
    pub curr_connections: u64,
    pub cmd_get: u64,
    pub cmd_set: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub total_items: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl StatsSnapshot {
    /// Renders the `STAT` lines in wire order.
    pub fn report(&self, store: StoreSnapshot) -> Vec<(&'static str, String)> {
        vec![
            ("pid", std::process::id().to_string()),
            ("uptime", self.uptime.to_string()),
            ("time", unix_now().to_string()),
            ("version", crate::VERSION.to_string()),
            ("curr_items", store.items.to_string()),
            ("total_items", self.total_items.to_string()),
            ("bytes", store.bytes.to_string()),
            ("curr_connections", self.curr_connections.to_string()),
            ("total_connections", self.total_connections.to_string()),
            ("cmd_get", self.cmd_get.to_string()),
            ("cmd_set", self.cmd_set.to_string()),
            ("get_hits", self.get_hits.to_string()),
            ("get_misses", self.get_misses.to_string()),
            ("bytes_read", self.bytes_read.to_string()),
            ("bytes_written", self.bytes_written.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_connection_counters() {
        let stats = Stats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 2);
        assert_eq!(snap.curr_connections, 1);
    }

    #[test]
    fn test_get_and_set_counters() {
        let stats = Stats::new();
        stats.record_get(true);
        stats.record_get(false);
        stats.record_get(false);
        stats.record_rejected_get();
        stats.record_set(true);
        stats.record_set(false);

        let snap = stats.snapshot();
        assert_eq!(snap.cmd_get, 4);
        assert_eq!(snap.get_hits, 1);
        assert_eq!(snap.get_misses, 2);
        assert_eq!(snap.cmd_set, 2);
        assert_eq!(snap.total_items, 1);
    }

    #[test]
    fn test_report_order() {
        let report = Stats::new().snapshot().report(StoreSnapshot { items: 4, bytes: 10 });
        let names: Vec<_> = report.iter().map(|(name, _)| *name).collect();

        assert_eq!(
            names,
            vec![
                "pid",
                "uptime",
                "time",
                "version",
                "curr_items",
                "total_items",
                "bytes",
                "curr_connections",
                "total_connections",
                "cmd_get",
                "cmd_set",
                "get_hits",
                "get_misses",
                "bytes_read",
                "bytes_written",
            ]
        );
        assert!(report.contains(&("curr_items", "4".to_string())));
        assert!(report.contains(&("bytes", "10".to_string())));
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(Stats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_get(true);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.snapshot().get_hits, 8000);
    }
}
