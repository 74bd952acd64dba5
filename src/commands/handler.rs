//! Command Handler Module
//!
//! This module drives the per-connection protocol state machine. It takes one
//! framed line at a time, decides from the [`Session`] whether the line is a
//! command or the payload of a pending SET, executes it against the storage
//! engine and returns what to send back.
//!
//! ## State Machine
//!
//! ```text
//!                 get / delete / incr / decr / version / stats
//!                 malformed arguments, unknown commands
//!                          ┌──────────┐
//!                          ▼          │
//!                 ┌──────────────────┐│
//!   connect ────> │ ReadyForCommand  │┘──── quit ────> (closed)
//!                 └──────────────────┘
//!                    │            ▲
//!       set <header> │            │ payload line
//!                    ▼            │ (STORED unless noreply)
//!                 ┌──────────────────┐
//!                 │ AwaitingPayload  │──── payload too long ────> (closed)
//!                 └──────────────────┘
//!
//!   set <header> over the item size limit ──> Discarding
//!   (SERVER_ERROR, the next line is swallowed, then ReadyForCommand)
//! ```

use crate::protocol::{parse_command, Command, Response};
use crate::stats::Stats;
use crate::storage::{ArithOp, ArithOutcome, Expiry, FillOutcome, StorageEngine};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Default limit on a declared payload length (1 MB).
pub const DEFAULT_MAX_ITEM_SIZE: usize = 1024 * 1024;

/// A SET whose header has been accepted and whose payload is due next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSet {
    pub key: Bytes,
    pub declared_length: usize,
    /// Reservation stamp returned by the engine
    pub generation: u64,
    pub noreply: bool,
}

/// Where a connection is in the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    ReadyForCommand,
    AwaitingPayload(PendingSet),
    /// The payload of a refused SET is due next and will be dropped.
    Discarding,
}

/// Per-connection protocol context. Owned by exactly one connection task.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_awaiting_payload(&self) -> bool {
        matches!(self.state, SessionState::AwaitingPayload(_))
    }

    /// Takes the pending SET, if any, leaving the session ready for commands.
    pub fn take_pending(&mut self) -> Option<PendingSet> {
        match std::mem::take(&mut self.state) {
            SessionState::AwaitingPayload(pending) => Some(pending),
            SessionState::ReadyForCommand | SessionState::Discarding => None,
        }
    }
}

/// What the connection should do after a line has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this response.
    Reply(Response),
    /// Nothing to write (noreply, unknown command, blank line).
    Silent,
    /// Close the connection without replying.
    Close,
}

/// A violation that leaves the connection unable to keep framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("payload of {actual} bytes exceeds declared length {declared}")]
    PayloadTooLong { declared: usize, actual: usize },
}

impl ProtocolViolation {
    /// The last line sent before the connection is closed.
    pub fn response(&self) -> Response {
        match self {
            ProtocolViolation::PayloadTooLong { .. } => Response::client_error("bad data chunk"),
        }
    }
}

/// Executes commands against the shared storage engine and stats.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    stats: Arc<Stats>,
    max_item_size: usize,
}

impl CommandHandler {
    /// Creates a command handler with the default item size limit.
    pub fn new(storage: Arc<StorageEngine>, stats: Arc<Stats>) -> Self {
        Self {
            storage,
            stats,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
        }
    }

    /// Sets the largest payload a SET may declare.
    pub fn with_max_item_size(mut self, max_item_size: usize) -> Self {
        self.max_item_size = max_item_size;
        self
    }

    pub fn max_item_size(&self) -> usize {
        self.max_item_size
    }

    /// Handles one line received on the connection owning `session`.
    pub fn execute(&self, session: &mut Session, line: &[u8]) -> Result<Action, ProtocolViolation> {
        match std::mem::take(&mut session.state) {
            SessionState::AwaitingPayload(pending) => self.complete_set(pending, line),
            SessionState::Discarding => {
                trace!(len = line.len(), "Swallowed payload of refused set");
                Ok(Action::Silent)
            }
            SessionState::ReadyForCommand => Ok(self.dispatch(session, line)),
        }
    }

    /// Dispatches a command line.
    fn dispatch(&self, session: &mut Session, line: &[u8]) -> Action {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => {
                if !line.is_empty() {
                    debug!(line = %String::from_utf8_lossy(line), "Ignoring unknown command");
                }
                return Action::Silent;
            }
            Err(e) => {
                if first_token(line) == Some(&b"get"[..]) {
                    self.stats.record_rejected_get();
                }
                debug!(error = %e, "Malformed command");
                return Action::Reply(Response::client_error(e.to_string()));
            }
        };

        trace!(command = command.name(), "Executing command");

        match command {
            Command::Get { key } => self.cmd_get(key),
            Command::Set {
                key,
                flags,
                exptime,
                length,
                noreply,
            } => self.cmd_set(session, key, flags, exptime, length, noreply),
            Command::Delete { key, noreply } => self.cmd_delete(&key, noreply),
            Command::Incr { key, delta, noreply } => {
                self.cmd_arith(&key, delta, ArithOp::Incr, noreply)
            }
            Command::Decr { key, delta, noreply } => {
                self.cmd_arith(&key, delta, ArithOp::Decr, noreply)
            }
            Command::Version => Action::Reply(Response::Version(crate::VERSION.to_string())),
            Command::Stats => self.cmd_stats(),
            Command::Quit => Action::Close,
        }
    }

    /// get <key>
    fn cmd_get(&self, key: Bytes) -> Action {
        let item = self.storage.get(&key);
        self.stats.record_get(item.is_some());

        Action::Reply(match item {
            Some(item) => Response::Value {
                key,
                flags: item.flags,
                data: item.data,
            },
            None => Response::End,
        })
    }

    /// set <key> <flags> <exptime> <bytes> [noreply]
    fn cmd_set(
        &self,
        session: &mut Session,
        key: Bytes,
        flags: u32,
        exptime: u64,
        length: usize,
        noreply: bool,
    ) -> Action {
        if length > self.max_item_size {
            session.state = SessionState::Discarding;
            return Action::Reply(Response::server_error("object too large for cache"));
        }

        let expiry = Expiry::from_exptime(exptime);
        let reservation = self.storage.set(key.clone(), flags, expiry, length);
        self.stats.record_set(!reservation.existed);

        session.state = SessionState::AwaitingPayload(PendingSet {
            key,
            declared_length: length,
            generation: reservation.generation,
            noreply,
        });
        Action::Silent
    }

    /// The payload line of a SET.
    fn complete_set(&self, pending: PendingSet, line: &[u8]) -> Result<Action, ProtocolViolation> {
        match self.storage.fill_payload(&pending.key, pending.generation, line) {
            FillOutcome::Stored => {}
            FillOutcome::KeyMissing => {
                // Deleted or overwritten by another connection in between
                debug!(
                    key = %String::from_utf8_lossy(&pending.key),
                    "Reservation superseded before its payload arrived"
                );
            }
            FillOutcome::TooLong { declared, actual } => {
                return Err(ProtocolViolation::PayloadTooLong { declared, actual });
            }
        }

        Ok(reply(pending.noreply, Response::Stored))
    }

    /// delete <key> [noreply]
    fn cmd_delete(&self, key: &[u8], noreply: bool) -> Action {
        let response = if self.storage.delete(key) {
            Response::Deleted
        } else {
            Response::NotFound
        };
        reply(noreply, response)
    }

    /// incr|decr <key> <amount> [noreply]
    fn cmd_arith(&self, key: &[u8], delta: u64, op: ArithOp, noreply: bool) -> Action {
        let response = match self.storage.incr_decr(key, delta, op) {
            ArithOutcome::Value(n) => Response::Number(n),
            ArithOutcome::NotFound => Response::NotFound,
            ArithOutcome::NotNumeric => {
                Response::client_error("cannot increment or decrement non-numeric value")
            }
        };
        reply(noreply, response)
    }

    /// stats
    fn cmd_stats(&self) -> Action {
        let store = self.storage.snapshot_stats();
        Action::Reply(Response::Stats(self.stats.snapshot().report(store)))
    }

    /// Releases the reservation of a SET whose payload never came.
    pub fn abandon(&self, session: &mut Session) {
        if let Some(pending) = session.take_pending() {
            self.storage.abandon(&pending.key, pending.generation);
        }
    }
}

fn first_token(line: &[u8]) -> Option<&[u8]> {
    line.split(|b| b.is_ascii_whitespace()).find(|t| !t.is_empty())
}

fn reply(noreply: bool, response: Response) -> Action {
    if noreply {
        Action::Silent
    } else {
        Action::Reply(response)
    }
}
