//! HTTP protocol implementation.
//!
//! One-request-per-connection HTTP/1.1, advanced by the reactor one
//! readiness event at a time:
//!
//! - **`handler`**: the per-connection state machine (accept, read, write)
//! - **`request`**: request accumulation and the request-line parser
//! - **`response`**: response headers, error documents and serialization
//! - **`content`**: streaming response bodies across partial writes
//! - **`codec`**: ISO-8859-1 protocol text, URI decoding, HTTP dates
//! - **`error`**: the protocol-vs-I/O failure split
//!
//! Every connection serves exactly one request and is closed once the
//! response has been fully written (`Connection: close` is always sent).

pub mod codec;
pub mod content;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
