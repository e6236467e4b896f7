//! # FlashLog - An Event-Driven Log Ingestion Endpoint
//!
//! FlashLog accepts streams of log records over TCP. Bytes arrive
//! fragmented and unpredictably sized; each connection accumulates them
//! in its own bounded buffer and hands complete records to a protocol
//! processor, keeping any trailing partial record for the next read.
//!
//! ## Features
//!
//! - **Single-threaded Reactor**: One mio poll drives every connection, no locks
//! - **Bounded Memory**: Buffers grow in fixed chunks up to a per-connection ceiling
//! - **Leak-free Teardown**: Unregister, then close, on every exit path
//! - **Pluggable Framing**: Any `ProtocolProcessor`; newline-delimited records built in
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashLog                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────────────────────────────────────┐    │
//! │  │   Server    │───>│            ConnectionRegistry               │    │
//! │  │ (mio Poll)  │    │  ┌────────────┐ ┌────────────┐ ┌────────┐   │    │
//! │  └─────────────┘    │  │ Connection │ │ Connection │ │ ...    │   │    │
//! │         ▲           │  │ ConnBuffer │ │ ConnBuffer │ │        │   │    │
//! │         │           │  └─────┬──────┘ └─────┬──────┘ └────────┘   │    │
//! │  ┌──────┴──────┐    └────────┼──────────────┼─────────────────────┘    │
//! │  │ MioEventLoop│             ▼              ▼                           │
//! │  │ (register / │    ┌─────────────────────────────────────────────┐    │
//! │  │  unregister)│    │      ProtocolProcessor (LineProcessor)      │    │
//! │  └─────────────┘    └──────────────────────┬──────────────────────┘    │
//! │                                            │ Record                     │
//! │                                            ▼                            │
//! │                                  tokio mpsc consumer                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use flashlog::{ConnectionStats, IngestConfig, LineProcessor, Server};
//! use std::sync::Arc;
//! use tokio::sync::mpsc::unbounded_channel;
//!
//! let config = Arc::new(IngestConfig::default());
//! let (tx, mut rx) = unbounded_channel();
//! let processor = LineProcessor::new(config.max_record_size, tx);
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let server = Server::bind(config, processor, stats)?;
//! let handle = server.handle();
//! std::thread::spawn(move || server.run());
//!
//! while let Some(record) = rx.blocking_recv() {
//!     println!("{:?}", record.payload);
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`buffer`]: Ceiling-bounded growable connection buffer
//! - [`connection`]: Connection lifecycle, event callback and registry
//! - [`protocol`]: Processor contract and the line processor
//! - [`reactor`]: Event loop contract and its mio implementation
//! - [`server`]: Listener and poll loop
//! - [`config`]: Shared settings and command-line parsing

pub mod buffer;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod reactor;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use buffer::{BufferError, ConnBuffer};
pub use config::{CliCommand, ConfigError, IngestConfig};
pub use connection::{
    ConnStatus, Connection, ConnectionError, ConnectionRegistry, ConnectionStats, EventResult,
};
pub use protocol::{LineProcessor, ProcessError, ProtocolProcessor, Record};
pub use reactor::{Event, EventLoop, Interest, MioEventLoop, Readiness, Registration, Token};
pub use server::{Server, ServerHandle};

/// The default port FlashLog listens on (same as the Fluent forward input)
pub const DEFAULT_PORT: u16 = 24224;

/// The default host FlashLog binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of FlashLog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
