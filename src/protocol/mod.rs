//! Memcached Text Protocol
//!
//! This module implements the line-oriented memcached text protocol.
//!
//! ## Overview
//!
//! Every request is a CRLF-terminated line whose first token names the
//! command. `set` is the one two-line command: its header line is followed by
//! a line carrying the raw payload.
//!
//! ## Modules
//!
//! - `types`: Defines the `Response` enum, serialization, and byte classes
//! - `parser`: Incremental CRLF line framing
//! - `command`: Tokenizes a line into a typed `Command`
//!
//! ## Example
//!
//! ```
//! use mcached::protocol::{parse_command, Command, LineParser, Frame, Response};
//! use bytes::Bytes;
//!
//! let mut parser = LineParser::new();
//! let (frame, _consumed) = parser.parse(b"get name\r\n").unwrap().unwrap();
//! let Frame::Line(line) = frame else { unreachable!() };
//! let command = parse_command(&line).unwrap().unwrap();
//! assert_eq!(command, Command::Get { key: Bytes::from("name") });
//!
//! assert_eq!(Response::End.serialize(), b"END\r\n");
//! ```

pub mod command;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use command::{parse_command, Command, CommandError, MAX_KEY_LENGTH};
pub use parser::{is_disconnect, Frame, LineParser, ParseError, ParseResult};
pub use types::{ascii, Response};
