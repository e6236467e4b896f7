//! Newline-Delimited Record Processor
//!
//! The bundled protocol: every record is one line of bytes terminated by
//! `\n`. A trailing `\r` is stripped and blank lines are skipped.
//!
//! ## How Decoding Works
//!
//! [`decode_record`] looks at the unconsumed bytes and returns either:
//! - `Ok(Some((payload, consumed)))` - a complete record, `consumed` bytes used
//! - `Ok(None)` - the record is incomplete, wait for more data
//! - `Err(ProcessError)` - the record can never fit, close the connection
//!
//! [`LineProcessor`] repeats this until the buffer holds only a partial
//! record, then compacts so the partial record starts at offset 0. It
//! leaves the buffer's scan cursor at the end of the partial record, so
//! the next call only searches bytes that arrived since.
//!
//! A partial record may hold `max + 1` bytes when the last one is the
//! `\r` of a `\r\n` terminator.

use crate::buffer::ConnBuffer;
use crate::protocol::processor::{ProcessError, ProtocolProcessor};
use crate::reactor::Token;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Connection the record arrived on
    pub token: Token,
    /// Line contents without the terminator
    pub payload: Bytes,
}

/// Decodes one record from the front of `buf`.
///
/// The first `from` bytes are known to hold no `\n` and are not searched
/// again.
pub fn decode_record(
    buf: &[u8],
    from: usize,
    max: usize,
) -> Result<Option<(Bytes, usize)>, ProcessError> {
    match find_newline(buf, from) {
        Some(pos) => {
            let line = match &buf[..pos] {
                [rest @ .., b'\r'] => rest,
                line => line,
            };
            if line.len() > max {
                return Err(ProcessError::RecordTooLarge {
                    size: line.len(),
                    max,
                });
            }
            Ok(Some((Bytes::copy_from_slice(line), pos + 1)))
        }
        None if partial_exceeds(buf, max) => Err(ProcessError::RecordTooLarge {
            size: buf.len(),
            max,
        }),
        None => Ok(None),
    }
}

#[inline]
fn find_newline(buf: &[u8], from: usize) -> Option<usize> {
    let from = from.min(buf.len());
    buf[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|pos| from + pos)
}

/// Whether an unterminated record can no longer fit in `max` bytes.
#[inline]
fn partial_exceeds(buf: &[u8], max: usize) -> bool {
    match buf {
        [line @ .., b'\r'] => line.len() > max,
        line => line.len() > max,
    }
}

/// Splits connection buffers into lines and forwards them as [`Record`]s.
#[derive(Debug)]
pub struct LineProcessor {
    max_record_size: usize,
    records: UnboundedSender<Record>,
}

impl LineProcessor {
    pub fn new(max_record_size: usize, records: UnboundedSender<Record>) -> Self {
        Self {
            max_record_size,
            records,
        }
    }
}

impl ProtocolProcessor for LineProcessor {
    fn process(&mut self, token: Token, buffer: &mut ConnBuffer) -> Result<usize, ProcessError> {
        let mut frames = 0;

        while let Some((payload, used)) =
            decode_record(buffer.unconsumed(), buffer.scanned(), self.max_record_size)?
        {
            buffer.consume(used)?;
            if payload.is_empty() {
                continue;
            }
            self.records
                .send(Record { token, payload })
                .map_err(|_| ProcessError::SinkClosed)?;
            frames += 1;
        }

        let partial = buffer.unconsumed().len();
        buffer.mark_scanned(partial);

        buffer.compact();
        trace!(
            token = %token,
            frames = frames,
            remaining = buffer.len(),
            "Processed buffer"
        );
        Ok(frames)
    }
}
