//! Connection Handler Module
//!
//! This module handles individual client connections to mcached.
//! Each client gets its own handler task that runs in a loop,
//! reading lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned (curr_connections + 1)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Cut CRLF lines          │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Session state machine   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write + flush reply     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. quit / EOF / interrupt byte / fatal error / idle timeout
//!        │
//!        ▼
//! 5. Pending reservation released, handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! A BytesMut buffer accumulates incoming data. TCP is a stream protocol, so
//! one read may hold half a line or several lines; every complete line is
//! handled in order before the next read.

use crate::commands::{Action, CommandHandler, ProtocolViolation, Session};
use crate::protocol::parser::DEFAULT_MAX_LINE_LENGTH;
use crate::protocol::{is_disconnect, Frame, LineParser, ParseError, Response};
use crate::stats::Stats;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Handles a single client connection.
///
/// Generic over the transport so the same loop serves TCP streams and
/// in-memory mocks.
pub struct ConnectionHandler<S> {
    /// The stream for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Line framer
    parser: LineParser,

    /// Protocol state owned by this connection only
    session: Session,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Server statistics (shared)
    stats: Arc<Stats>,

    /// Close the connection after this long without data
    idle_timeout: Option<Duration>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler and counts the connection as open.
    ///
    /// The line limit is raised to the item size limit when that is larger,
    /// so any payload a SET may declare fits on one line.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<Stats>,
    ) -> Self {
        stats.connection_opened();
        let max_line_length = DEFAULT_MAX_LINE_LENGTH.max(command_handler.max_item_size());

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: LineParser::with_max_line_length(max_line_length),
            session: Session::new(),
            command_handler,
            stats,
            idle_timeout: None,
        }
    }

    /// Sets the idle timeout. `None` waits for data forever.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Replaces the line framer, e.g. to lower the line length limit.
    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = parser;
        self
    }

    /// Runs the main connection loop until the client leaves or an error
    /// ends the connection.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                ConnectionError::IdleTimeout(_) => {
                    debug!(client = %self.addr, "Closing idle connection")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        if self.session.is_awaiting_payload() {
            debug!(client = %self.addr, "Releasing unfinished set");
            self.command_handler.abandon(&mut self.session);
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_parse_frame()? {
                let line = match frame {
                    Frame::Line(line) => line,
                    Frame::Rejected(line) => {
                        warn!(
                            client = %self.addr,
                            len = line.len(),
                            "Dropping line with non-printable bytes"
                        );
                        continue;
                    }
                };

                match self.command_handler.execute(&mut self.session, &line) {
                    Ok(Action::Reply(response)) => self.send_response(&response).await?,
                    Ok(Action::Silent) => {}
                    Ok(Action::Close) => return Ok(()),
                    Err(violation) => {
                        self.send_response(&violation.response()).await?;
                        return Err(ConnectionError::Protocol(violation));
                    }
                }
            }

            if is_disconnect(&self.buffer) {
                debug!(client = %self.addr, "Client sent interrupt");
                return Err(ConnectionError::ClientDisconnected);
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to cut one line from the buffer.
    fn try_parse_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed line"
                );
                Ok(Some(frame))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete line, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Framing error");
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Grow geometrically so a large payload line takes few reads
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer
                .reserve(INITIAL_BUFFER_SIZE.max(self.buffer.len()));
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(limit))??,
            None => read.await?,
        };

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes and flushes one response.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Framing error (line too long)
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// The client broke the protocol in a way the session cannot recover from
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial line)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// No data within the idle timeout
    #[error("Idle for {0:?}")]
    IdleTimeout(Duration),
}

/// Handles a client connection to completion, logging how it ended.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<Stats>,
    idle_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler =
        ConnectionHandler::new(stream, addr, command_handler, stats).with_idle_timeout(idle_timeout);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected | ConnectionError::IdleTimeout(_) => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
