//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the entry store behind the cache: a sharded,
//! concurrent HashMap whose entries carry client flags, a payload of fixed
//! declared length, and an optional expiry.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are striped across shards, each with its own lock.
//! 2. **Lazy Expiry**: Expired entries are misses on access and are removed then.
//! 3. **Active Expiry**: `sweep` removes a bounded number of expired entries per call.
//! 4. **Two-Step SET**: `set` reserves a slot; `fill_payload` attaches the body.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation on a key, including the read-modify-write of
//! `incr_decr` and the expiry check that precedes a removal, runs under that
//! key's shard lock. No lock is ever held across an `.await`.

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Expiry times above this many seconds (30 days) are absolute unix times.
pub const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

/// When an entry stops being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The entry lives until it is overwritten or deleted.
    Never,
    /// The entry expires this long after it was set.
    After(Duration),
}

impl Expiry {
    /// Converts a wire `exptime` using the current wall clock.
    pub fn from_exptime(exptime: u64) -> Self {
        Self::from_exptime_at(exptime, unix_now())
    }

    /// Converts a wire `exptime` relative to `now_unix` (seconds since the epoch).
    ///
    /// `0` never expires and values up to 30 days are relative. Larger values
    /// are absolute unix timestamps; one that is not in the future never
    /// expires.
    pub fn from_exptime_at(exptime: u64, now_unix: u64) -> Self {
        match exptime {
            0 => Expiry::Never,
            secs if secs <= MAX_RELATIVE_EXPTIME => Expiry::After(Duration::from_secs(secs)),
            at if at > now_unix => Expiry::After(Duration::from_secs(at - now_unix)),
            _ => Expiry::Never,
        }
    }
}

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Opaque client flags
    pub flags: u32,
    /// The payload; empty until the reservation is filled
    pub data: Bytes,
    /// Length announced by the SET header
    pub declared_length: usize,
    /// When the entry was created or last overwritten by SET
    pub set_at: Instant,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
    /// Stamp binding the entry to the SET that reserved it
    generation: u64,
    /// False between the SET header and its payload line
    complete: bool,
}

impl Entry {
    fn reserve(
        flags: u32,
        expiry: Expiry,
        declared_length: usize,
        generation: u64,
        now: Instant,
    ) -> Self {
        let expires_at = match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => now.checked_add(ttl),
        };
        Self {
            flags,
            data: Bytes::new(),
            declared_length,
            set_at: now,
            expires_at,
            generation,
            complete: false,
        }
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns true once the payload has been attached.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    #[inline]
    fn is_visible_at(&self, now: Instant) -> bool {
        self.complete && !self.is_expired_at(now)
    }

    fn item(&self) -> Item {
        Item {
            flags: self.flags,
            data: self.data.clone(),
        }
    }
}

/// What a GET sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub flags: u32,
    pub data: Bytes,
}

/// Result of reserving a slot with [`StorageEngine::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Whether an unexpired entry with this key was replaced
    pub existed: bool,
    /// Must be handed back to [`StorageEngine::fill_payload`]
    pub generation: u64,
}

/// Result of [`StorageEngine::fill_payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The payload was attached (padded to the declared length if short).
    Stored,
    /// The reservation is gone: deleted, evicted, or replaced by a newer SET.
    KeyMissing,
    /// The payload is longer than declared. The reservation is dropped.
    TooLong { declared: usize, actual: usize },
}

/// Direction of a numeric update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Incr,
    Decr,
}

/// Result of [`StorageEngine::incr_decr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOutcome {
    Value(u64),
    NotFound,
    NotNumeric,
}

/// Point-in-time view of live contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// Live, completed entries
    pub items: u64,
    /// Sum of their payload lengths
    pub bytes: u64,
}

type Shard = RwLock<HashMap<Bytes, Entry>>;

/// The entry store.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection tasks and the expiry sweeper. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use mcached::storage::{Expiry, FillOutcome, StorageEngine};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// let reservation = engine.set(Bytes::from("foo"), 0, Expiry::Never, 3);
/// assert!(!reservation.existed);
/// assert_eq!(
///     engine.fill_payload(b"foo", reservation.generation, b"bar"),
///     FillOutcome::Stored
/// );
///
/// let item = engine.get(b"foo").unwrap();
/// assert_eq!(item.data, Bytes::from("bar"));
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Physical entries, including pending and not-yet-swept expired ones
    key_count: AtomicU64,

    /// Source of reservation stamps
    next_generation: AtomicU64,

    /// Shard the next sweep starts from
    sweep_cursor: AtomicUsize,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            next_generation: AtomicU64::new(0),
            sweep_cursor: AtomicUsize::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Gets the live entry for a key.
    ///
    /// Returns `None` if the key doesn't exist, has expired, or is still
    /// waiting for its payload. Expired entries are removed on the way out.
    pub fn get(&self, key: &[u8]) -> Option<Item> {
        let now = Instant::now();
        let shard = self.get_shard(key);

        // Fast path under the read lock
        {
            let data = shard.read();
            match data.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => {
                    return entry.complete.then(|| entry.item());
                }
                Some(_) => {}
            }
        }

        // Expired: take the write lock and re-check before removing
        let mut data = shard.write();
        let expired = match data.get(key) {
            None => return None,
            Some(entry) => entry.is_expired_at(now),
        };
        if expired {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            return None;
        }
        data.get(key).filter(|e| e.complete).map(Entry::item)
    }

    /// Reserves a slot for `key`, unconditionally replacing whatever was there.
    ///
    /// The new entry stays invisible to readers until [`fill_payload`] attaches
    /// its body.
    ///
    /// [`fill_payload`]: StorageEngine::fill_payload
    pub fn set(&self, key: Bytes, flags: u32, expiry: Expiry, declared_length: usize) -> Reservation {
        let now = Instant::now();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry::reserve(flags, expiry, declared_length, generation, now);

        let shard = self.get_shard(&key);
        let mut data = shard.write();

        let previous = data.insert(key, entry);
        if previous.is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Reservation {
            existed: previous.is_some_and(|p| !p.is_expired_at(now)),
            generation,
        }
    }

    /// Attaches the payload to the reservation made by `set`.
    ///
    /// A payload shorter than the declared length is right-padded with spaces.
    pub fn fill_payload(&self, key: &[u8], generation: u64, payload: &[u8]) -> FillOutcome {
        let shard = self.get_shard(key);
        let mut data = shard.write();

        let declared = match data.get(key) {
            Some(entry) if entry.generation == generation && !entry.complete => {
                entry.declared_length
            }
            _ => return FillOutcome::KeyMissing,
        };

        if payload.len() > declared {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            return FillOutcome::TooLong {
                declared,
                actual: payload.len(),
            };
        }

        let mut body = BytesMut::with_capacity(declared);
        body.extend_from_slice(payload);
        body.resize(declared, b' ');

        if let Some(entry) = data.get_mut(key) {
            entry.data = body.freeze();
            entry.complete = true;
        }
        FillOutcome::Stored
    }

    /// Drops a reservation whose payload will never arrive.
    ///
    /// Only removes the entry if it is still the pending slot stamped with
    /// `generation`.
    pub fn abandon(&self, key: &[u8], generation: u64) -> bool {
        let shard = self.get_shard(key);
        let mut data = shard.write();

        let pending = data
            .get(key)
            .is_some_and(|e| e.generation == generation && !e.complete);
        if pending {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
        pending
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live entry was removed, `false` if the key didn't
    /// exist, had expired, or was still waiting for its payload. A pending
    /// reservation is removed all the same, so its payload is later dropped.
    pub fn delete(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let shard = self.get_shard(key);
        let mut data = shard.write();

        match data.remove(key) {
            Some(entry) => {
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                entry.complete && !entry.is_expired_at(now)
            }
            None => false,
        }
    }

    /// Adds `delta` to, or subtracts it from, a numeric payload.
    ///
    /// The payload (trailing padding ignored) must be a base-10 unsigned
    /// integer. Increments wrap at 2^64; decrements stop at zero. The new
    /// digits are written back left-aligned and space padded to the old
    /// payload length, or the payload grows when the number got longer.
    /// Flags, expiry and `set_at` are left alone.
    pub fn incr_decr(&self, key: &[u8], delta: u64, op: ArithOp) -> ArithOutcome {
        let now = Instant::now();
        let shard = self.get_shard(key);
        let mut data = shard.write();

        let expired = match data.get(key) {
            None => return ArithOutcome::NotFound,
            Some(entry) => entry.is_expired_at(now),
        };
        if expired {
            data.remove(key);
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            return ArithOutcome::NotFound;
        }

        let Some(entry) = data.get_mut(key).filter(|e| e.complete) else {
            return ArithOutcome::NotFound;
        };

        let Some(current) = parse_counter(&entry.data) else {
            return ArithOutcome::NotNumeric;
        };

        let value = match op {
            ArithOp::Incr => current.wrapping_add(delta),
            ArithOp::Decr => current.saturating_sub(delta),
        };

        entry.data = render_counter(value, entry.data.len());
        ArithOutcome::Value(value)
    }

    /// Removes up to `max_keys` entries that have expired as of `now`.
    ///
    /// Shards are visited round-robin starting where the previous call
    /// stopped, each under its own lock, so a single call never holds the
    /// whole store.
    ///
    /// # Returns
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant, max_keys: usize) -> usize {
        let start = self.sweep_cursor.load(Ordering::Relaxed);
        let mut evicted = 0usize;

        for offset in 0..NUM_SHARDS {
            if evicted >= max_keys {
                break;
            }

            let index = (start + offset) % NUM_SHARDS;
            let mut budget = max_keys - evicted;
            let mut data = self.shards[index].write();
            let before = data.len();

            data.retain(|_, entry| {
                if budget > 0 && entry.is_expired_at(now) {
                    budget -= 1;
                    false
                } else {
                    true
                }
            });

            evicted += before - data.len();

            // Resume on this shard if it may still hold expired entries
            let next = if budget == 0 { index } else { index + 1 };
            self.sweep_cursor.store(next % NUM_SHARDS, Ordering::Relaxed);
        }

        if evicted > 0 {
            self.key_count.fetch_sub(evicted as u64, Ordering::Relaxed);
        }

        evicted
    }

    /// Counts live entries and their payload bytes.
    ///
    /// Each shard is read under its own lock; the totals are consistent per
    /// shard, not across the whole map.
    pub fn snapshot_stats(&self) -> StoreSnapshot {
        let now = Instant::now();
        let mut snapshot = StoreSnapshot::default();

        for shard in &self.shards {
            let data = shard.read();
            for entry in data.values().filter(|e| e.is_visible_at(now)) {
                snapshot.items += 1;
                snapshot.bytes += entry.data.len() as u64;
            }
        }

        snapshot
    }

    /// Returns the number of physically stored entries.
    ///
    /// This includes pending reservations and expired entries that have not
    /// been swept yet.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the raw entry, pending or expired included.
    pub fn entry(&self, key: &[u8]) -> Option<Entry> {
        self.get_shard(key).read().get(key).cloned()
    }
}

/// Parses a counter payload, ignoring trailing padding.
fn parse_counter(data: &[u8]) -> Option<u64> {
    let end = data.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let digits = &data[..end];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Renders a counter, space padded to `width` when it is shorter.
fn render_counter(value: u64, width: usize) -> Bytes {
    let mut digits = value.to_string().into_bytes();
    if digits.len() < width {
        digits.resize(width, b' ');
    }
    Bytes::from(digits)
}
