//! The contract between a connection and whatever decodes its bytes.

use crate::buffer::{BufferError, ConnBuffer};
use crate::reactor::Token;
use thiserror::Error;

/// A fatal decoding failure. The connection that produced it is closed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessError {
    /// A record, or an unterminated partial record, is too long
    #[error("record too large: {size} bytes (max: {max})")]
    RecordTooLarge { size: usize, max: usize },

    /// The input is not valid for this protocol
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Nobody is listening for decoded records any more
    #[error("record sink closed")]
    SinkClosed,

    /// The processor moved the buffer offsets out of range
    #[error("buffer misuse: {0}")]
    Buffer(#[from] BufferError),
}

/// Decodes complete frames out of a connection buffer.
///
/// `process` is called after every successful read with the whole buffer.
/// The processor reads [`ConnBuffer::unconsumed`], marks what it decoded
/// with [`ConnBuffer::consume`] and may [`ConnBuffer::compact`] the buffer
/// so the free region is reclaimed. [`ConnBuffer::mark_scanned`] lets it
/// remember how far it already searched an incomplete frame. It must not block and must not keep
/// references into the buffer after returning.
pub trait ProtocolProcessor {
    /// Returns the number of frames decoded, or a fatal error.
    fn process(&mut self, token: Token, buffer: &mut ConnBuffer) -> Result<usize, ProcessError>;
}
