//! mio-backed event loop.

use super::{EventLoop, Interest, Readiness, Registration, Token};
use mio::net::TcpStream;
use std::io;
use tracing::trace;

/// Registers connection sockets with a `mio::Registry`.
///
/// The `Poll` itself stays with the server; this only holds a cloned
/// registry handle so connections can be added and removed from inside
/// event dispatch.
#[derive(Debug)]
pub struct MioEventLoop {
    registry: mio::Registry,
}

impl MioEventLoop {
    pub fn new(registry: mio::Registry) -> Self {
        Self { registry }
    }

    /// Builds an event loop from the registry of an existing poll.
    pub fn from_poll(poll: &mio::Poll) -> io::Result<Self> {
        Ok(Self::new(poll.registry().try_clone()?))
    }
}

impl EventLoop<TcpStream> for MioEventLoop {
    fn register(
        &mut self,
        source: &mut TcpStream,
        token: Token,
        interest: Interest,
    ) -> io::Result<Registration> {
        let interest = match interest {
            Interest::Readable => mio::Interest::READABLE,
        };
        self.registry
            .register(source, mio::Token(token.0), interest)?;
        trace!(token = %token, "Registered with poll");
        Ok(Registration::new(token))
    }

    fn unregister(&mut self, source: &mut TcpStream, registration: Registration) -> io::Result<()> {
        self.registry.deregister(source)?;
        trace!(token = %registration.token(), "Deregistered from poll");
        Ok(())
    }
}

/// Translates a mio event into the readiness mask the registry understands.
pub fn readiness_of(event: &mio::event::Event) -> Readiness {
    let mut readiness = Readiness::EMPTY;
    if event.is_readable() {
        readiness = readiness | Readiness::READABLE;
    }
    if event.is_read_closed() || event.is_write_closed() {
        readiness = readiness | Readiness::HANGUP;
    }
    if event.is_writable() {
        readiness = readiness | Readiness::WRITABLE;
    }
    if event.is_error() {
        readiness = readiness | Readiness::ERROR;
    }
    readiness
}
