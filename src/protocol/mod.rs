//! Protocol Processing
//!
//! Connections do not understand the bytes they buffer. After each read
//! they hand their buffer to a [`ProtocolProcessor`], which decodes as many
//! complete frames as it can and leaves any trailing partial frame for the
//! next read.
//!
//! ## Modules
//!
//! - `processor`: The `ProtocolProcessor` trait and its fatal `ProcessError`
//! - `line`: Newline-delimited records, the processor the server uses
//!
//! ## Example
//!
//! ```
//! use flashlog::buffer::ConnBuffer;
//! use flashlog::protocol::{LineProcessor, ProtocolProcessor};
//! use flashlog::reactor::Token;
//! use tokio::sync::mpsc::unbounded_channel;
//!
//! let (tx, mut rx) = unbounded_channel();
//! let mut processor = LineProcessor::new(1024, tx);
//!
//! let mut buffer = ConnBuffer::new(64, 64, 256).unwrap();
//! buffer.spare_mut()[..12].copy_from_slice(b"hello\nworld\n");
//! buffer.commit(12).unwrap();
//!
//! assert_eq!(processor.process(Token(1), &mut buffer).unwrap(), 2);
//! assert_eq!(&rx.try_recv().unwrap().payload[..], b"hello");
//! ```

pub mod line;
pub mod processor;

pub use line::{decode_record, LineProcessor, Record};
pub use processor::{ProcessError, ProtocolProcessor};
