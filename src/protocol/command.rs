//! Command Tokenizing
//!
//! Turns one framed line into a typed [`Command`]. Tokens are separated by
//! ASCII whitespace; the first token selects the command and is matched
//! case-sensitively.

use bytes::Bytes;
use thiserror::Error;

/// Longest key accepted, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// The `noreply` modifier token.
const NOREPLY: &[u8] = b"noreply";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `get <key>`
    Get { key: Bytes },

    /// `set <key> <flags> <exptime> <bytes> [noreply]`
    ///
    /// The payload follows on the next line.
    Set {
        key: Bytes,
        flags: u32,
        exptime: u64,
        length: usize,
        noreply: bool,
    },

    /// `delete <key> [noreply]`
    Delete { key: Bytes, noreply: bool },

    /// `incr <key> <amount> [noreply]`
    Incr { key: Bytes, delta: u64, noreply: bool },

    /// `decr <key> <amount> [noreply]`
    Decr { key: Bytes, delta: u64, noreply: bool },

    /// `version`
    Version,

    /// `stats`
    Stats,

    /// `quit`
    Quit,
}

impl Command {
    /// Returns the wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Set { .. } => "set",
            Command::Delete { .. } => "delete",
            Command::Incr { .. } => "incr",
            Command::Decr { .. } => "decr",
            Command::Version => "version",
            Command::Stats => "stats",
            Command::Quit => "quit",
        }
    }
}

/// Malformed arguments on a recognized command.
///
/// The `Display` text is what goes after `CLIENT_ERROR ` on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("invalid flags")]
    InvalidFlags,

    #[error("invalid exptime")]
    InvalidExptime,

    #[error("invalid length")]
    InvalidLength,

    #[error("invalid numeric delta argument")]
    InvalidDelta,

    #[error("key too long")]
    KeyTooLong,
}

/// Parses one command line.
///
/// Returns `Ok(None)` for a blank line or an unrecognized command token;
/// those are ignored without a reply.
pub fn parse_command(line: &[u8]) -> Result<Option<Command>, CommandError> {
    let parts: Vec<&[u8]> = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let Some((&name, args)) = parts.split_first() else {
        return Ok(None);
    };

    let command = match name {
        b"get" => {
            let key = key_arg(args, "get")?;
            Command::Get { key }
        }
        b"set" => {
            if args.len() < 4 {
                return Err(CommandError::WrongArity("set"));
            }
            let key = key_arg(args, "set")?;
            let flags = number::<u32>(args[1]).ok_or(CommandError::InvalidFlags)?;
            // Negative expiry times are refused outright.
            let exptime = number::<u64>(args[2]).ok_or(CommandError::InvalidExptime)?;
            let length = number::<usize>(args[3]).ok_or(CommandError::InvalidLength)?;
            Command::Set {
                key,
                flags,
                exptime,
                length,
                noreply: noreply_at(args, 4),
            }
        }
        b"delete" => {
            let key = key_arg(args, "delete")?;
            Command::Delete {
                key,
                noreply: noreply_at(args, 1),
            }
        }
        b"incr" | b"decr" => {
            let cmd = if name == b"incr" { "incr" } else { "decr" };
            if args.len() < 2 {
                return Err(CommandError::WrongArity(cmd));
            }
            let key = key_arg(args, cmd)?;
            let delta = number::<u64>(args[1]).ok_or(CommandError::InvalidDelta)?;
            let noreply = noreply_at(args, 2);
            if name == b"incr" {
                Command::Incr { key, delta, noreply }
            } else {
                Command::Decr { key, delta, noreply }
            }
        }
        b"version" => Command::Version,
        b"stats" => Command::Stats,
        b"quit" => Command::Quit,
        _ => return Ok(None),
    };

    Ok(Some(command))
}

fn key_arg(args: &[&[u8]], cmd: &'static str) -> Result<Bytes, CommandError> {
    let key = args.first().ok_or(CommandError::WrongArity(cmd))?;
    if key.len() > MAX_KEY_LENGTH {
        return Err(CommandError::KeyTooLong);
    }
    Ok(Bytes::copy_from_slice(key))
}

fn noreply_at(args: &[&[u8]], index: usize) -> bool {
    args.get(index).is_some_and(|t| *t == NOREPLY)
}

fn number<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    std::str::from_utf8(token).ok()?.parse().ok()
}
