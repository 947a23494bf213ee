//! The two failure paths a connection can take.
//!
//! Protocol errors carry a status code and reason and are answered on the
//! wire with a well-formed error response; I/O errors mean the channel
//! itself is broken and the connection is closed without a response. The
//! two must not be conflated: only the former ever reaches the peer.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ServerError {
    /// The request could not be served, but the connection is intact; an
    /// error response with this code and reason is still sent.
    Protocol { code: u16, reason: String },
    /// The channel failed. No response is attempted.
    Io(io::Error),
}

impl ServerError {
    pub fn protocol(code: u16, reason: impl Into<String>) -> Self {
        ServerError::Protocol {
            code,
            reason: reason.into(),
        }
    }

    pub fn bad_request() -> Self {
        Self::protocol(400, "Bad request")
    }

    pub fn forbidden() -> Self {
        Self::protocol(403, "Forbidden")
    }

    pub fn not_found() -> Self {
        Self::protocol(404, "Not found")
    }

    pub fn not_implemented() -> Self {
        Self::protocol(501, "Method not implemented")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Protocol { code, reason } => write!(f, "{code} {reason}"),
            ServerError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Protocol { .. } => None,
            ServerError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        ServerError::Io(e)
    }
}
