//! Connection Buffer
//!
//! Each connection accumulates incoming bytes in a `ConnBuffer`. TCP is a
//! stream protocol: a read may deliver half a record, or several records
//! at once, so bytes stay here until the protocol processor has consumed
//! them.
//!
//! ## Layout
//!
//! ```text
//! 0             consumed              len                 capacity
//! ├──────────────────┼──────────────────┼──────────────────────┤
//! │ already handed   │ waiting for the  │ free space for the   │
//! │ to the processor │ processor        │ next read            │
//! └──────────────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! ## Growth
//!
//! The buffer starts at one initial chunk and grows one fixed step at a
//! time. It never shrinks. A step that would take the capacity past the
//! ceiling is refused with [`BufferError::CeilingExceeded`], which is how a
//! connection is told to give up on a client that keeps sending without
//! completing a record.

use crate::config::IngestConfig;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors raised while allocating or growing a buffer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BufferError {
    /// The next growth step would pass the configured ceiling
    #[error("buffer ceiling exceeded: growing {capacity} -> {requested} bytes (max: {ceiling})")]
    CeilingExceeded {
        capacity: usize,
        requested: usize,
        ceiling: usize,
    },

    /// The allocator refused the memory
    #[error("buffer allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// A commit or consume reached past the region it applies to
    #[error("buffer overrun: {requested} bytes requested, {available} available")]
    Overrun { requested: usize, available: usize },
}

/// A growable, ceiling-bounded byte buffer owned by one connection.
#[derive(Debug)]
pub struct ConnBuffer {
    /// Backing storage, always exactly `capacity` bytes long
    storage: Vec<u8>,

    /// Number of valid bytes at the front of `storage`
    len: usize,

    /// Number of valid bytes already accepted by the processor
    consumed: usize,

    /// Unconsumed bytes already searched for a record boundary
    scanned: usize,

    /// Size of every growth step
    growth_chunk: usize,

    /// Largest capacity this buffer may reach
    ceiling: usize,
}

impl ConnBuffer {
    /// Allocates a buffer of `initial` bytes.
    ///
    /// Fails if `initial` is above `ceiling` or cannot be allocated.
    pub fn new(initial: usize, growth_chunk: usize, ceiling: usize) -> Result<Self, BufferError> {
        if initial > ceiling {
            return Err(BufferError::CeilingExceeded {
                capacity: 0,
                requested: initial,
                ceiling,
            });
        }

        let mut storage = Vec::new();
        storage.try_reserve_exact(initial)?;
        storage.resize(initial, 0);

        Ok(Self {
            storage,
            len: 0,
            consumed: 0,
            scanned: 0,
            growth_chunk,
            ceiling,
        })
    }

    /// Allocates a buffer sized by the shared configuration.
    pub fn for_config(config: &IngestConfig) -> Result<Self, BufferError> {
        Self::new(
            config.chunk_size,
            config.growth_chunk(),
            config.buffer_size_ceiling,
        )
    }

    /// Current capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space left before the buffer must grow.
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }

    /// Offset of the first byte the processor has not accepted yet.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// The largest capacity this buffer may reach.
    #[inline]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// All valid bytes, consumed or not.
    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Valid bytes the processor has not accepted yet.
    pub fn unconsumed(&self) -> &[u8] {
        &self.storage[self.consumed..self.len]
    }

    /// The free region a read may fill.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.len..]
    }

    /// Marks `n` bytes of the free region as valid after a read.
    ///
    /// Fails without touching the buffer if `n` is larger than the free
    /// region.
    pub fn commit(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.available();
        if n > available {
            return Err(BufferError::Overrun {
                requested: n,
                available,
            });
        }
        self.len += n;
        Ok(())
    }

    /// Ensures at least `additional` free bytes, taking at most one
    /// growth step.
    ///
    /// Returns `true` if the buffer grew. A single step may still leave
    /// less than `additional` bytes free when `additional` is larger than
    /// the growth chunk; the next call takes another step.
    pub fn reserve_at_least(&mut self, additional: usize) -> Result<bool, BufferError> {
        if self.available() >= additional {
            return Ok(false);
        }

        let capacity = self.capacity();
        let requested = capacity.saturating_add(self.growth_chunk);
        if requested > self.ceiling {
            return Err(BufferError::CeilingExceeded {
                capacity,
                requested,
                ceiling: self.ceiling,
            });
        }

        self.storage.try_reserve_exact(self.growth_chunk)?;
        self.storage.resize(requested, 0);
        Ok(true)
    }

    /// Accepts `n` more bytes on behalf of the processor.
    ///
    /// Fails without touching the buffer if fewer than `n` unconsumed
    /// bytes are left.
    pub fn consume(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.len - self.consumed;
        if n > available {
            return Err(BufferError::Overrun {
                requested: n,
                available,
            });
        }
        self.consumed += n;
        self.scanned = self.scanned.saturating_sub(n);
        Ok(())
    }

    /// How many unconsumed bytes the processor has already searched
    /// without finding a record boundary.
    #[inline]
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Records that the first `n` unconsumed bytes hold no record
    /// boundary, so the next search can start after them.
    pub fn mark_scanned(&mut self, n: usize) {
        self.scanned = n.min(self.len - self.consumed);
    }

    /// Moves the unconsumed bytes to the front and resets the offset.
    ///
    /// Capacity and the scan cursor are left untouched.
    pub fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.storage.copy_within(self.consumed..self.len, 0);
        self.len -= self.consumed;
        self.consumed = 0;
    }
}
