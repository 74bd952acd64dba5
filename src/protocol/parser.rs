//! CRLF Line Framing
//!
//! The text protocol is a stream of lines. This module cuts complete,
//! CRLF-terminated lines off the front of a read buffer and classifies them.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - A complete line was found, `consumed` bytes were used
//! - `Ok(None)` - Need more data, no terminator yet
//! - `Err(ParseError)` - The peer is sending a line we refuse to buffer
//!
//! This design allows the caller to:
//! 1. Append incoming network data to a buffer
//! 2. Call `parse()` until it returns `Ok(None)`
//! 3. Advance the buffer by `consumed` bytes after each frame
//! 4. Check the unterminated remainder with [`is_disconnect`]
//! 5. Read more data

use crate::protocol::types::ascii;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while framing lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A line grew past the configured limit without a terminator
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Default upper bound on a single line, terminator excluded (2 MB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 2 * 1024 * 1024;

/// One framed line, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Every byte is printable ASCII (or a stray CR/LF).
    Line(Bytes),
    /// The line carries a control or non-ASCII byte and must be dropped.
    Rejected(Bytes),
}

/// Incremental CRLF line parser.
///
/// # Example
///
/// ```
/// use mcached::protocol::parser::{Frame, LineParser};
/// use bytes::Bytes;
///
/// let mut parser = LineParser::new();
/// let (frame, consumed) = parser.parse(b"get foo\r\nget").unwrap().unwrap();
/// assert_eq!(frame, Frame::Line(Bytes::from("get foo")));
/// assert_eq!(consumed, 9);
/// assert!(parser.parse(b"get").unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a parser that refuses lines longer than `max_line_length`.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// Returns the configured line limit.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Attempts to cut one line off the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let pos = match find_crlf(buf) {
            Some(pos) => pos,
            None => {
                if buf.len() > self.max_line_length {
                    return Err(ParseError::LineTooLong {
                        size: buf.len(),
                        max: self.max_line_length,
                    });
                }
                return Ok(None);
            }
        };

        if pos > self.max_line_length {
            return Err(ParseError::LineTooLong {
                size: pos,
                max: self.max_line_length,
            });
        }

        let content = &buf[..pos];
        let data = Bytes::copy_from_slice(content);
        let frame = if content.iter().all(|&b| is_line_byte(b)) {
            Frame::Line(data)
        } else {
            Frame::Rejected(data)
        };

        Ok(Some((frame, pos + 2)))
    }
}

/// Printable ASCII plus bare CR and LF.
#[inline]
fn is_line_byte(b: u8) -> bool {
    ascii::is_printable(b) || b == ascii::CR || b == ascii::LF
}

/// Returns true when the unterminated bytes left in the buffer end with an
/// interrupt byte (Ctrl-C or Ctrl-D), meaning the client is hanging up.
///
/// A one-byte chunk holding only ACK or EOT is the common case.
pub fn is_disconnect(pending: &[u8]) -> bool {
    pending.last().is_some_and(|&b| ascii::is_interrupt(b))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::ascii::{ACK, EOT};

    fn parse(input: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        LineParser::new().parse(input)
    }

    #[test]
    fn test_parse_line() {
        let (frame, consumed) = parse(b"get foo\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Line(Bytes::from("get foo")));
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_parse_incomplete() {
        assert!(parse(b"get foo").unwrap().is_none());
        assert!(parse(b"get foo\r").unwrap().is_none());
        assert!(parse(b"").unwrap().is_none());
    }

    #[test]
    fn test_parse_empty_line() {
        let (frame, consumed) = parse(b"\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Line(Bytes::new()));
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_parse_pipelined_lines_in_order() {
        let input = b"set a 0 0 1\r\nx\r\nget a\r\n";
        let mut parser = LineParser::new();
        let mut offset = 0;
        let mut lines = Vec::new();

        while let Some((frame, consumed)) = parser.parse(&input[offset..]).unwrap() {
            lines.push(frame);
            offset += consumed;
        }

        assert_eq!(offset, input.len());
        assert_eq!(
            lines,
            vec![
                Frame::Line(Bytes::from("set a 0 0 1")),
                Frame::Line(Bytes::from("x")),
                Frame::Line(Bytes::from("get a")),
            ]
        );
    }

    #[test]
    fn test_non_printable_line_rejected() {
        let (frame, consumed) = parse(b"get \x00foo\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Rejected(Bytes::from(&b"get \x00foo"[..])));
        assert_eq!(consumed, 10);

        let (frame, _) = parse(b"caf\xc3\xa9\r\n").unwrap().unwrap();
        assert!(matches!(frame, Frame::Rejected(_)));
    }

    #[test]
    fn test_bare_lf_is_allowed() {
        let (frame, _) = parse(b"a\nb\r\n").unwrap().unwrap();
        assert_eq!(frame, Frame::Line(Bytes::from("a\nb")));
    }

    #[test]
    fn test_line_too_long() {
        let mut parser = LineParser::with_max_line_length(8);
        assert_eq!(
            parser.parse(b"0123456789"),
            Err(ParseError::LineTooLong { size: 10, max: 8 })
        );
        assert_eq!(
            parser.parse(b"0123456789\r\n"),
            Err(ParseError::LineTooLong { size: 10, max: 8 })
        );
        assert!(parser.parse(b"01234567\r\n").unwrap().is_some());
    }

    #[test]
    fn test_is_disconnect() {
        assert!(is_disconnect(&[ACK]));
        assert!(is_disconnect(&[EOT]));
        assert!(is_disconnect(&[0xff, 0xf4, 0xff, 0xfd, ACK]));
        assert!(!is_disconnect(b"g"));
        assert!(!is_disconnect(b""));
    }
}
