//! Connection Registry
//!
//! Owns every live connection, keyed by the [`Token`] it was registered
//! under, together with the event loop and the protocol processor. The
//! reactor reports readiness by token; [`ConnectionRegistry::dispatch`]
//! routes it to the connection and deletes the connection when the
//! notification ends it.
//!
//! A deleted connection is removed from the map before it is torn down,
//! so a later notification for the same token finds nothing and is
//! ignored.

use crate::config::IngestConfig;
use crate::connection::handler::{Connection, ConnectionError, ReadinessHandler};
use crate::connection::stats::ConnectionStats;
use crate::protocol::ProtocolProcessor;
use crate::reactor::{Event, EventLoop, Token};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// First token handed to a connection. Lower values are left for the
/// listener and wakers of whoever drives the registry.
pub const CONNECTION_TOKEN_START: usize = 1024;

/// What a notification did, as reported back to the reactor.
#[derive(Debug)]
pub enum EventResult {
    /// A read delivered this many bytes
    Read(usize),
    /// Readable, but the socket had nothing yet
    Idle,
    /// Nothing to do (hangup, other condition, or unknown token)
    Ignored,
    /// The connection was deleted
    Closed(ConnectionError),
}

impl EventResult {
    /// Integer form: bytes read, 0 for no effect, -1 once the connection
    /// is gone.
    pub fn code(&self) -> isize {
        match self {
            EventResult::Read(n) => *n as isize,
            EventResult::Idle | EventResult::Ignored => 0,
            EventResult::Closed(_) => -1,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, EventResult::Closed(_))
    }
}

/// All live connections of one event loop.
pub struct ConnectionRegistry<S, L, P>
where
    S: Read,
    L: EventLoop<S>,
    P: ProtocolProcessor,
{
    connections: HashMap<Token, Connection<S>>,
    event_loop: L,
    processor: P,
    config: Arc<IngestConfig>,
    stats: Arc<ConnectionStats>,
    next_token: usize,
}

impl<S, L, P> ConnectionRegistry<S, L, P>
where
    S: Read,
    L: EventLoop<S>,
    P: ProtocolProcessor,
{
    pub fn new(
        event_loop: L,
        processor: P,
        config: Arc<IngestConfig>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            connections: HashMap::new(),
            event_loop,
            processor,
            config,
            stats,
            next_token: CONNECTION_TOKEN_START,
        }
    }

    /// Takes ownership of an accepted socket and registers it.
    pub fn add(&mut self, stream: S) -> Result<Token, ConnectionError> {
        let token = self.allocate_token();
        let conn = Connection::add(
            stream,
            token,
            Arc::clone(&self.config),
            &mut self.event_loop,
        )?;

        self.connections.insert(token, conn);
        self.stats.connection_opened();
        debug!(token = %token, active = self.connections.len(), "Connection registered");
        Ok(token)
    }

    /// Handles one readiness notification.
    pub fn dispatch(&mut self, event: Event) -> EventResult {
        let Some(conn) = self.connections.get_mut(&event.token) else {
            trace!(token = %event.token, readiness = ?event.readiness, "Event for unknown connection");
            return EventResult::Ignored;
        };

        if event.readiness.is_readable() {
            match conn.on_readable(&mut self.processor) {
                Ok(Some(progress)) => {
                    self.stats.bytes_read(progress.bytes);
                    self.stats.records_processed(progress.frames);
                    EventResult::Read(progress.bytes)
                }
                Ok(None) => EventResult::Idle,
                Err(err) => {
                    self.record_failure(event.token, &err);
                    self.delete(event.token);
                    EventResult::Closed(err)
                }
            }
        } else if event.readiness.is_hangup() {
            conn.on_hangup();
            EventResult::Ignored
        } else {
            EventResult::Ignored
        }
    }

    /// Deletes a connection. Returns `false` if the token is not live.
    pub fn delete(&mut self, token: Token) -> bool {
        match self.connections.remove(&token) {
            Some(conn) => {
                conn.delete(&mut self.event_loop);
                self.stats.connection_closed();
                true
            }
            None => false,
        }
    }

    /// Deletes every connection.
    pub fn shutdown(&mut self) {
        if self.connections.is_empty() {
            return;
        }
        info!(count = self.connections.len(), "Closing all connections");
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.delete(token);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains_key(&token)
    }

    pub fn connection(&self, token: Token) -> Option<&Connection<S>> {
        self.connections.get(&token)
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    fn allocate_token(&mut self) -> Token {
        while self.connections.contains_key(&Token(self.next_token)) {
            self.next_token = self.next_token.wrapping_add(1).max(CONNECTION_TOKEN_START);
        }
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(CONNECTION_TOKEN_START);
        token
    }

    fn record_failure(&self, token: Token, err: &ConnectionError) {
        match err {
            ConnectionError::BufferFull(_) => {
                self.stats.buffer_rejected();
                warn!(token = %token, error = %err, "Closing connection");
            }
            ConnectionError::Protocol(_) => {
                self.stats.protocol_error();
                warn!(token = %token, error = %err, "Closing connection");
            }
            _ if err.is_disconnect() => {
                debug!(token = %token, "Client disconnected");
            }
            _ => warn!(token = %token, error = %err, "Connection error"),
        }
    }
}

impl<S, L, P> Drop for ConnectionRegistry<S, L, P>
where
    S: Read,
    L: EventLoop<S>,
    P: ProtocolProcessor,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
