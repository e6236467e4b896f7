//! TCP Server
//!
//! Drives a [`ConnectionRegistry`] with a mio poll on the calling thread.
//!
//! ```text
//!   poll() ──> Token(0) listener ──> accept until WouldBlock ──> registry.add()
//!          ├─> Token(1) waker    ──> check shutdown flag
//!          └─> Token(n)          ──> registry.dispatch() while it reads data
//! ```
//!
//! mio reports readiness edge-triggered, so a readable connection is
//! dispatched again and again until a dispatch stops reporting progress.
//! Each dispatch still performs exactly one read.

use crate::config::IngestConfig;
use crate::connection::{ConnectionRegistry, ConnectionStats, EventResult};
use crate::protocol::ProtocolProcessor;
use crate::reactor::poll::readiness_of;
use crate::reactor::{Event, MioEventLoop, Token};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Waker};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

const LISTENER: mio::Token = mio::Token(0);
const WAKER: mio::Token = mio::Token(1);

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl ServerHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

/// A single-threaded ingestion endpoint.
pub struct Server<P: ProtocolProcessor> {
    poll: Poll,
    listener: TcpListener,
    registry: ConnectionRegistry<TcpStream, MioEventLoop, P>,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
    event_capacity: usize,
}

impl<P: ProtocolProcessor> Server<P> {
    /// Binds the listener and prepares the poll.
    pub fn bind(
        config: Arc<IngestConfig>,
        processor: P,
        stats: Arc<ConnectionStats>,
    ) -> io::Result<Self> {
        let addr: SocketAddr = config.bind_address().parse().map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid bind address {}: {}", config.bind_address(), e),
            )
        })?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        let event_loop = MioEventLoop::from_poll(&poll)?;
        let event_capacity = config.event_capacity;
        let registry = ConnectionRegistry::new(event_loop, processor, config, stats);

        Ok(Self {
            poll,
            listener,
            registry,
            waker,
            shutdown: Arc::new(AtomicBool::new(false)),
            event_capacity,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            waker: Arc::clone(&self.waker),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Runs until [`ServerHandle::shutdown`] is called, then closes every
    /// connection.
    pub fn run(mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(self.event_capacity);
        info!(addr = %self.local_addr()?, "Accepting connections");

        while !self.shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_pending(),
                    WAKER => trace!("Woken"),
                    mio::Token(id) => {
                        self.drive(Event::new(Token(id), readiness_of(event)));
                    }
                }
            }
        }

        info!("Shutting down");
        self.registry.shutdown();
        Ok(())
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => match self.registry.add(stream) {
                    Ok(token) => debug!(client = %addr, token = %token, "Client connected"),
                    Err(e) => error!(client = %addr, error = %e, "Failed to add connection"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    break;
                }
            }
        }
    }

    fn drive(&mut self, event: Event) {
        while let EventResult::Read(_) = self.registry.dispatch(event) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LineProcessor, Record};
    use bytes::Bytes;
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn test_config(chunk: usize, ceiling: usize) -> Arc<IngestConfig> {
        let mut config = IngestConfig {
            port: 0,
            chunk_size: chunk,
            buffer_size_ceiling: ceiling,
            ..Default::default()
        };
        config.max_record_size = chunk - crate::config::MAX_TERMINATOR_LEN;
        config.validate().unwrap();
        Arc::new(config)
    }

    fn recv_timeout(rx: &mut UnboundedReceiver<Record>, timeout: Duration) -> Option<Record> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(record) = rx.try_recv() {
                return Some(record);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_records_flow_end_to_end() {
        let (tx, mut rx) = unbounded_channel();
        let stats = Arc::new(ConnectionStats::new());
        let config = test_config(16, 256);
        let server = Server::bind(
            Arc::clone(&config),
            LineProcessor::new(config.max_record_size, tx),
            Arc::clone(&stats),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let worker = thread::spawn(move || server.run());

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        client.write_all(b"hello\nwor").unwrap();
        client.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        client.write_all(b"ld\n").unwrap();

        let first = recv_timeout(&mut rx, Duration::from_secs(2)).unwrap();
        let second = recv_timeout(&mut rx, Duration::from_secs(2)).unwrap();
        assert_eq!(first.payload, Bytes::from("hello"));
        assert_eq!(second.payload, Bytes::from("world"));
        assert_eq!(first.token, second.token);

        drop(client);
        assert!(wait_for(|| stats.snapshot().active_connections == 0));
        assert_eq!(stats.snapshot().connections_accepted, 1);
        assert_eq!(stats.snapshot().bytes_read, 12);

        handle.shutdown().unwrap();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_oversized_sender_is_disconnected() {
        let (tx, _rx) = unbounded_channel();
        let stats = Arc::new(ConnectionStats::new());
        let config = test_config(64, 128);
        let server = Server::bind(
            Arc::clone(&config),
            LineProcessor::new(config.max_record_size, tx),
            Arc::clone(&stats),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let worker = thread::spawn(move || server.run());

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        // No newline: the record can never complete
        let _ = client.write_all(&[b'x'; 512]);

        assert!(wait_for(|| stats.snapshot().protocol_errors == 1));
        assert!(wait_for(|| stats.snapshot().active_connections == 0));

        handle.shutdown().unwrap();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_shutdown_closes_open_connections() {
        let (tx, _rx) = unbounded_channel();
        let stats = Arc::new(ConnectionStats::new());
        let config = test_config(64, 128);
        let server = Server::bind(
            Arc::clone(&config),
            LineProcessor::new(config.max_record_size, tx),
            Arc::clone(&stats),
        )
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let worker = thread::spawn(move || server.run());

        let _client = std::net::TcpStream::connect(addr).unwrap();
        assert!(wait_for(|| stats.snapshot().active_connections == 1));

        handle.shutdown().unwrap();
        worker.join().unwrap().unwrap();
        assert_eq!(stats.snapshot().active_connections, 0);
    }

    #[test]
    fn test_bind_rejects_bad_address() {
        let (tx, _rx) = unbounded_channel();
        let config = Arc::new(IngestConfig {
            host: "not an address".to_string(),
            ..Default::default()
        });
        let result = Server::bind(
            Arc::clone(&config),
            LineProcessor::new(config.max_record_size, tx),
            Arc::new(ConnectionStats::new()),
        );
        assert!(matches!(result, Err(e) if e.kind() == ErrorKind::InvalidInput));
    }
}
