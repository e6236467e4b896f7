//! Connection Management Module
//!
//! This module manages individual client connections to FlashLog. All
//! connections of an endpoint live on one thread and are driven by a
//! reactor: nothing here blocks or spawns.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Reactor (server.rs / mio)                  │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ Event { token, readiness }
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ConnectionRegistry                         │
//! │                                                             │
//! │   token ──> Connection ──> on_readable()                    │
//! │                              │                              │
//! │   ┌─────────────┐    ┌───────┴─────┐    ┌─────────────┐     │
//! │   │ Grow buffer │───>│ read() once │───>│  Processor  │     │
//! │   └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                                             │
//! │   on error: remove from map, unregister, close socket       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking I/O**: One read per notification, never waits
//! - **Bounded Buffers**: Fixed-step growth up to a per-connection ceiling
//! - **Leak-free Teardown**: One destruction routine for every exit path
//! - **Statistics**: Tracks connection, byte and record counters

pub mod handler;
pub mod registry;
pub mod stats;

// Re-export commonly used types
pub use handler::{ConnStatus, Connection, ConnectionError, ReadProgress, ReadinessHandler};
pub use registry::{ConnectionRegistry, EventResult, CONNECTION_TOKEN_START};
pub use stats::{ConnectionStats, StatsSnapshot};
