//! Reactor Interface
//!
//! The connection core does not own an event loop. It talks to one through
//! the small [`EventLoop`] trait: register a socket for read-readiness
//! under a [`Token`], and unregister it again. The reactor later delivers
//! an [`Event`] carrying that token and a [`Readiness`] mask, and the
//! registry routes it back to the right connection.
//!
//! ```text
//!    ┌─────────────────────┐   register(stream, token)   ┌──────────────┐
//!    │ ConnectionRegistry  │ ──────────────────────────> │  EventLoop   │
//!    │                     │ <────────────────────────── │  (mio, ...)  │
//!    └─────────────────────┘     Event { token, mask }   └──────────────┘
//! ```
//!
//! [`MioEventLoop`] is the implementation used by the server.

pub mod poll;

pub use poll::MioEventLoop;

use std::fmt;
use std::io;
use std::ops::BitOr;

/// Identity of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The readiness a source is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
}

/// Condition mask delivered with a notification.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness(u8);

impl Readiness {
    pub const EMPTY: Readiness = Readiness(0);
    pub const READABLE: Readiness = Readiness(0b0001);
    pub const HANGUP: Readiness = Readiness(0b0010);
    pub const WRITABLE: Readiness = Readiness(0b0100);
    pub const ERROR: Readiness = Readiness(0b1000);

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.contains(Self::READABLE)
    }

    #[inline]
    pub fn is_hangup(self) -> bool {
        self.contains(Self::HANGUP)
    }

    #[inline]
    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READABLE, "READABLE"),
            (Self::HANGUP, "HANGUP"),
            (Self::WRITABLE, "WRITABLE"),
            (Self::ERROR, "ERROR"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "EMPTY")
        } else {
            write!(f, "{}", set.join(" | "))
        }
    }
}

/// A readiness notification for one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub token: Token,
    pub readiness: Readiness,
}

impl Event {
    pub fn new(token: Token, readiness: Readiness) -> Self {
        Self { token, readiness }
    }
}

/// Proof that a source is registered with an event loop.
///
/// Owned by exactly one connection and given back to the loop by
/// [`EventLoop::unregister`]. Neither `Clone` nor `Copy`: a registration
/// is released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct Registration {
    token: Token,
}

impl Registration {
    pub fn new(token: Token) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Token {
        self.token
    }
}

/// The part of a reactor the connection core needs.
///
/// `S` is the socket type the loop can watch.
pub trait EventLoop<S> {
    /// Starts delivering `interest` notifications for `source` under `token`.
    fn register(
        &mut self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<Registration>;

    /// Stops all notifications for `source`.
    fn unregister(&mut self, source: &mut S, registration: Registration) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_flags() {
        let mask = Readiness::READABLE | Readiness::HANGUP;
        assert!(mask.is_readable());
        assert!(mask.is_hangup());
        assert!(!mask.contains(Readiness::WRITABLE));
        assert!(!mask.is_empty());

        assert!(Readiness::EMPTY.is_empty());
        assert!(!Readiness::EMPTY.is_readable());
        assert!(!Readiness::HANGUP.is_readable());
    }

    #[test]
    fn test_readiness_debug() {
        assert_eq!(format!("{:?}", Readiness::EMPTY), "EMPTY");
        assert_eq!(
            format!("{:?}", Readiness::READABLE | Readiness::ERROR),
            "READABLE | ERROR"
        );
    }

    #[test]
    fn test_registration_keeps_token() {
        let registration = Registration::new(Token(7));
        assert_eq!(registration.token(), Token(7));
        assert_eq!(Token(7).to_string(), "7");
    }
}
