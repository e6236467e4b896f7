//! Connection Handler
//!
//! A `Connection` owns one accepted socket, its event-loop registration
//! and the buffer its bytes accumulate in. It never blocks: every read
//! opportunity performs exactly one non-blocking read and returns.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Accept path hands over a socket
//!        │
//!        ▼
//! 2. Connection::add ── buffer alloc fails ──> socket closed, Err(Allocation)
//!        │          └── register fails ─────> buffer + socket released, Err(Registration)
//!        ▼
//! 3. ┌──────────────────────────────────────┐
//!    │  status: New                         │
//!    │                                      │
//!    │  on_readable (once per notification) │
//!    │   ├─ grow buffer one chunk if full   │
//!    │   ├─ read() into the free region     │
//!    │   │  (retried while Interrupted)     │
//!    │   └─ processor.process(buffer)       │
//!    │                                      │
//!    │  status: Active after the first read │
//!    └──────────────────────────────────────┘
//!        │  EOF / read error / ceiling / processor failure
//!        ▼
//! 4. Connection::delete: unregister, then close the socket and free the buffer
//! ```
//!
//! `delete` takes the connection by value, so nothing can touch it once
//! teardown has started.

use crate::buffer::{BufferError, ConnBuffer};
use crate::config::IngestConfig;
use crate::protocol::{ProcessError, ProtocolProcessor};
use crate::reactor::{EventLoop, Interest, Registration, Token};
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Lifecycle of a live connection.
///
/// There is no closed state: a closed connection no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// Registered, nothing read yet
    New,
    /// At least one read delivered data
    Active,
}

/// Outcome of a read opportunity that made progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    /// Bytes the read delivered
    pub bytes: usize,
    /// Frames the processor decoded afterwards
    pub frames: usize,
}

/// Errors that end a connection, or prevent one from being created.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error while reading
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Buffer memory could not be allocated
    #[error("Buffer allocation failed: {0}")]
    Allocation(#[source] BufferError),

    /// The event loop refused the socket
    #[error("Event loop registration failed: {0}")]
    Registration(#[source] io::Error),

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded: {0}")]
    BufferFull(#[source] BufferError),

    /// The processor rejected the buffered bytes
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProcessError),

    /// Client disconnected (zero-byte read)
    #[error("Client disconnected")]
    ClientDisconnected,
}

impl From<BufferError> for ConnectionError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::CeilingExceeded { .. } => ConnectionError::BufferFull(err),
            BufferError::Allocation(_) => ConnectionError::Allocation(err),
            // Only a read reporting more bytes than it was given gets here
            BufferError::Overrun { .. } => {
                ConnectionError::IoError(io::Error::new(ErrorKind::InvalidData, err))
            }
        }
    }
}

impl ConnectionError {
    /// True for routine peer-initiated endings.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected => true,
            ConnectionError::IoError(err) => matches!(
                err.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Capability the reactor drives a connection through.
pub trait ReadinessHandler {
    /// Handles a read-readiness notification.
    ///
    /// `Ok(None)` means the notification was spurious and nothing was
    /// read. An error means the connection must be deleted.
    fn on_readable<P: ProtocolProcessor>(
        &mut self,
        processor: &mut P,
    ) -> Result<Option<ReadProgress>, ConnectionError>;

    /// Handles a hangup reported without read-readiness.
    fn on_hangup(&mut self);
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection<S> {
    /// Identity under which the socket is registered
    token: Token,

    /// The socket, closed when the connection is dropped
    stream: S,

    /// Bytes received and not yet fully consumed
    buffer: ConnBuffer,

    status: ConnStatus,

    /// Shared settings (read-only)
    config: Arc<IngestConfig>,

    /// Released back to the event loop by `delete`
    registration: Registration,
}

impl<S: Read> Connection<S> {
    /// Creates a connection for an accepted socket and registers it for
    /// read-readiness.
    ///
    /// On failure the socket is closed and nothing is left registered.
    pub fn add<L>(
        mut stream: S,
        token: Token,
        config: Arc<IngestConfig>,
        event_loop: &mut L,
    ) -> Result<Self, ConnectionError>
    where
        L: EventLoop<S>,
    {
        let buffer = ConnBuffer::for_config(&config).map_err(|e| {
            error!(token = %token, error = %e, "Could not allocate new connection");
            ConnectionError::Allocation(e)
        })?;

        let registration = event_loop
            .register(&mut stream, token, Interest::Readable)
            .map_err(|e| {
                error!(token = %token, error = %e, "Could not register new connection");
                ConnectionError::Registration(e)
            })?;

        trace!(token = %token, capacity = buffer.capacity(), "Connection added");

        Ok(Self {
            token,
            stream,
            buffer,
            status: ConnStatus::New,
            config,
            registration,
        })
    }

    /// Unregisters the connection, then closes its socket and frees its
    /// buffer.
    pub fn delete<L>(mut self, event_loop: &mut L)
    where
        L: EventLoop<S>,
    {
        if let Err(e) = event_loop.unregister(&mut self.stream, self.registration) {
            warn!(token = %self.token, error = %e, "Failed to unregister connection");
        }
        debug!(token = %self.token, buffered = self.buffer.len(), "Connection deleted");
        // Dropping `self` closes the socket and releases the buffer
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn status(&self) -> ConnStatus {
        self.status
    }

    pub fn buffer(&self) -> &ConnBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }
}

impl<S: Read> ReadinessHandler for Connection<S> {
    fn on_readable<P: ProtocolProcessor>(
        &mut self,
        processor: &mut P,
    ) -> Result<Option<ReadProgress>, ConnectionError> {
        if self.buffer.available() < 1 {
            let before = self.buffer.capacity();
            if let Err(e) = self.buffer.reserve_at_least(1) {
                warn!(
                    token = %self.token,
                    capacity = before,
                    ceiling = self.buffer.ceiling(),
                    error = %e,
                    "Could not grow connection buffer"
                );
                return Err(e.into());
            }
            trace!(
                token = %self.token,
                from = before,
                to = self.buffer.capacity(),
                "Buffer grown"
            );
        }

        let bytes = loop {
            match self.stream.read(self.buffer.spare_mut()) {
                Ok(0) => {
                    trace!(token = %self.token, "Peer closed connection");
                    return Err(ConnectionError::ClientDisconnected);
                }
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(ConnectionError::IoError(e)),
            }
        };

        self.buffer.commit(bytes)?;
        self.status = ConnStatus::Active;
        trace!(token = %self.token, bytes = bytes, buffered = self.buffer.len(), "Read data");

        let frames = processor.process(self.token, &mut self.buffer)?;
        Ok(Some(ReadProgress { bytes, frames }))
    }

    fn on_hangup(&mut self) {
        trace!(token = %self.token, "Hangup");
    }
}
