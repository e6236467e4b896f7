//! Test doubles for the reactor boundary.
//!
//! `ScriptedStream` replays a fixed sequence of read results and behaves
//! like a non-blocking socket once the script runs dry. `JournalLoop`
//! records every register and unregister call. Both write into a shared
//! [`Journal`] so tests can check the order in which a connection's
//! resources were released.

use crate::buffer::ConnBuffer;
use crate::protocol::{ProcessError, ProtocolProcessor};
use crate::reactor::{EventLoop, Interest, Registration, Token};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Registered(Token),
    Unregistered(Token),
    /// A stream was dropped; carries the stream id
    Closed(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Op>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, op: Op) {
        self.0.borrow_mut().push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().clone()
    }

    pub fn count(&self, op: &Op) -> usize {
        self.0.borrow().iter().filter(|o| *o == op).count()
    }
}

#[derive(Debug)]
pub enum Step {
    Data(Vec<u8>),
    Eof,
    Fail(ErrorKind),
    /// Claims one byte more than the region it was offered
    Overreport,
}

#[derive(Debug)]
pub struct ScriptedStream {
    id: usize,
    steps: VecDeque<Step>,
    journal: Journal,
    reads: Rc<RefCell<Vec<usize>>>,
}

impl ScriptedStream {
    pub fn new(id: usize, journal: &Journal) -> Self {
        Self {
            id,
            steps: VecDeque::new(),
            journal: journal.clone(),
            reads: Rc::default(),
        }
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.steps.push_back(Step::Data(bytes.to_vec()));
        self
    }

    pub fn eof(mut self) -> Self {
        self.steps.push_back(Step::Eof);
        self
    }

    pub fn fail(mut self, kind: ErrorKind) -> Self {
        self.steps.push_back(Step::Fail(kind));
        self
    }

    pub fn overreport(mut self) -> Self {
        self.steps.push_back(Step::Overreport);
        self
    }

    /// Sizes of the regions every `read` call was offered.
    pub fn read_sizes(&self) -> Rc<RefCell<Vec<usize>>> {
        Rc::clone(&self.reads)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.borrow_mut().push(buf.len());
        match self.steps.pop_front() {
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::Eof) => Ok(0),
            Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
            Some(Step::Overreport) => Ok(buf.len() + 1),
            None => Err(io::Error::from(ErrorKind::WouldBlock)),
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.journal.push(Op::Closed(self.id));
    }
}

#[derive(Debug, Default)]
pub struct JournalLoop {
    journal: Journal,
    pub fail_register: bool,
}

impl JournalLoop {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_register: false,
        }
    }
}

impl EventLoop<ScriptedStream> for JournalLoop {
    fn register(
        &mut self,
        _source: &mut ScriptedStream,
        token: Token,
        _interest: Interest,
    ) -> io::Result<Registration> {
        if self.fail_register {
            return Err(io::Error::other("registration refused"));
        }
        self.journal.push(Op::Registered(token));
        Ok(Registration::new(token))
    }

    fn unregister(
        &mut self,
        _source: &mut ScriptedStream,
        registration: Registration,
    ) -> io::Result<()> {
        self.journal.push(Op::Unregistered(registration.token()));
        Ok(())
    }
}

/// Leaves every byte in the buffer, so tests can inspect what was read.
#[derive(Debug, Default)]
pub struct KeepAll {
    pub calls: Vec<usize>,
}

impl ProtocolProcessor for KeepAll {
    fn process(&mut self, _token: Token, buffer: &mut ConnBuffer) -> Result<usize, ProcessError> {
        self.calls.push(buffer.len());
        Ok(0)
    }
}

/// Rejects whatever it is given.
#[derive(Debug, Default)]
pub struct Reject {
    pub calls: usize,
}

impl ProtocolProcessor for Reject {
    fn process(&mut self, _token: Token, _buffer: &mut ConnBuffer) -> Result<usize, ProcessError> {
        self.calls += 1;
        Err(ProcessError::Malformed("rejected".to_string()))
    }
}

/// Consumes one byte more than the buffer holds.
#[derive(Debug, Default)]
pub struct Overconsume;

impl ProtocolProcessor for Overconsume {
    fn process(&mut self, _token: Token, buffer: &mut ConnBuffer) -> Result<usize, ProcessError> {
        let len = buffer.unconsumed().len();
        buffer.consume(len + 1)?;
        Ok(0)
    }
}
