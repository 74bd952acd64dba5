//! Memcached Text Protocol Data Types
//!
//! This module defines the replies the server writes back and the byte
//! classification helpers the line parser relies on.
//!
//! ## Protocol Format
//!
//! Every reply is one or more ASCII lines terminated with CRLF (`\r\n`):
//!
//! ```text
//! STORED\r\n
//! DELETED\r\n
//! NOT_FOUND\r\n
//! VALUE <key> <flags> <bytes>\r\n<data>\r\nEND\r\n
//! END\r\n
//! 42\r\n
//! VERSION 0.2.0\r\n
//! STAT <name> <value>\r\n ... END\r\n
//! CLIENT_ERROR <message>\r\n
//! SERVER_ERROR <message>\r\n
//! ```

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used by every line of the protocol
pub const CRLF: &[u8] = b"\r\n";

/// Control bytes with a meaning on the wire.
pub mod ascii {
    /// End of transmission (Ctrl-D)
    pub const EOT: u8 = 0x04;
    /// Acknowledge; the last byte of a telnet interrupt sequence (Ctrl-C)
    pub const ACK: u8 = 0x06;
    pub const LF: u8 = b'\n';
    pub const CR: u8 = b'\r';
    pub const SPACE: u8 = b' ';

    /// Returns true for printable ASCII, space through tilde.
    #[inline]
    pub fn is_printable(byte: u8) -> bool {
        (0x20..=0x7e).contains(&byte)
    }

    /// Returns true for the bytes a client sends when it is hanging up.
    #[inline]
    pub fn is_interrupt(byte: u8) -> bool {
        byte == ACK || byte == EOT
    }
}

/// A reply to a single command.
///
/// `Value` and `End` together cover GET: a hit writes the `VALUE` line, the
/// payload line and `END`; a miss writes only `END`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `STORED`
    Stored,

    /// `DELETED`
    Deleted,

    /// `NOT_FOUND`
    NotFound,

    /// A GET hit, terminated by `END`.
    Value { key: Bytes, flags: u32, data: Bytes },

    /// `END` on its own (GET miss)
    End,

    /// The result of INCR/DECR as a bare decimal line.
    Number(u64),

    /// `VERSION <version>`
    Version(String),

    /// `STAT <name> <value>` lines followed by `END`.
    Stats(Vec<(&'static str, String)>),

    /// `CLIENT_ERROR <message>`
    ClientError(String),

    /// `SERVER_ERROR <message>`
    ServerError(String),
}

impl Response {
    /// Creates a client error response.
    ///
    /// # Example
    /// ```
    /// use mcached::protocol::types::Response;
    /// let err = Response::client_error("bad command line format");
    /// assert_eq!(err.serialize(), b"CLIENT_ERROR bad command line format\r\n");
    /// ```
    pub fn client_error(msg: impl Into<String>) -> Self {
        Response::ClientError(msg.into())
    }

    /// Creates a server error response.
    pub fn server_error(msg: impl Into<String>) -> Self {
        Response::ServerError(msg.into())
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => line(buf, b"STORED"),
            Response::Deleted => line(buf, b"DELETED"),
            Response::NotFound => line(buf, b"NOT_FOUND"),
            Response::Value { key, flags, data } => {
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(format!(" {} {}", flags, data.len()).as_bytes());
                buf.extend_from_slice(CRLF);
                line(buf, data);
                line(buf, b"END");
            }
            Response::End => line(buf, b"END"),
            Response::Number(n) => line(buf, n.to_string().as_bytes()),
            Response::Version(v) => {
                buf.extend_from_slice(b"VERSION ");
                line(buf, v.as_bytes());
            }
            Response::Stats(stats) => {
                for (name, value) in stats {
                    buf.extend_from_slice(format!("STAT {} {}", name, value).as_bytes());
                    buf.extend_from_slice(CRLF);
                }
                line(buf, b"END");
            }
            Response::ClientError(msg) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                line(buf, msg.as_bytes());
            }
            Response::ServerError(msg) => {
                buf.extend_from_slice(b"SERVER_ERROR ");
                line(buf, msg.as_bytes());
            }
        }
    }

    /// Returns true if this response reports an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::ClientError(_) | Response::ServerError(_))
    }
}

#[inline]
fn line(buf: &mut Vec<u8>, content: &[u8]) {
    buf.extend_from_slice(content);
    buf.extend_from_slice(CRLF);
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Stored => write!(f, "STORED"),
            Response::Deleted => write!(f, "DELETED"),
            Response::NotFound => write!(f, "NOT_FOUND"),
            Response::Value { key, flags, data } => write!(
                f,
                "VALUE {} {} {}",
                String::from_utf8_lossy(key),
                flags,
                data.len()
            ),
            Response::End => write!(f, "END"),
            Response::Number(n) => write!(f, "{}", n),
            Response::Version(v) => write!(f, "VERSION {}", v),
            Response::Stats(stats) => write!(f, "({} stats)", stats.len()),
            Response::ClientError(msg) => write!(f, "CLIENT_ERROR {}", msg),
            Response::ServerError(msg) => write!(f, "SERVER_ERROR {}", msg),
        }
    }
}
