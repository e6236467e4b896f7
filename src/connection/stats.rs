//! Connection statistics shared by the registry and the binary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total records handed out by the processor
    pub records_processed: AtomicU64,
    /// Connections closed because their buffer hit the ceiling
    pub buffer_rejections: AtomicU64,
    /// Connections closed because the processor failed
    pub protocol_errors: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_processed(&self, count: usize) {
        self.records_processed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn buffer_rejected(&self) {
        self.buffer_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            buffer_rejections: self.buffer_rejections.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}

/// Plain values read from [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub bytes_read: u64,
    pub records_processed: u64,
    pub buffer_rejections: u64,
    pub protocol_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        stats.bytes_read(10);
        stats.bytes_read(5);
        stats.records_processed(3);
        stats.buffer_rejected();
        stats.protocol_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.bytes_read, 15);
        assert_eq!(snapshot.records_processed, 3);
        assert_eq!(snapshot.buffer_rejections, 1);
        assert_eq!(snapshot.protocol_errors, 1);
    }
}
