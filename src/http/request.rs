//! HTTP request representation.

use crate::http::codec;
use crate::http::error::ServerError;

/// A request whose accumulated text outgrows this cap without completing is
/// rejected with 413.
pub const MAX_REQUEST_SIZE: usize = 8 * 1024;

/// A request in the process of being received.
///
/// Raw protocol text accumulates in `input` across reads; `method` and
/// `uri` stay absent until `parse` succeeds, which happens exactly once,
/// when the request first becomes complete.
#[derive(Debug, Default)]
pub struct Request {
    input: String,
    method: Option<String>,
    uri: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds decoded text to the request.
    ///
    /// Returns `true` once the request is complete: everything received so
    /// far ends in a blank line. Bare-LF line endings are tolerated.
    pub fn append(&mut self, text: &str) -> bool {
        self.input.push_str(text);
        self.input.ends_with("\r\n\r\n") || self.input.ends_with("\n\n")
    }

    /// Whether the accumulated text has exceeded [`MAX_REQUEST_SIZE`].
    pub fn oversized(&self) -> bool {
        self.input.len() > MAX_REQUEST_SIZE
    }

    /// Parses the request line. The method is everything before the first
    /// space; the URI is the percent-decoded text between the first two
    /// spaces. Anything after the second space (such as the HTTP version
    /// token) is ignored.
    pub fn parse(&mut self) -> Result<(), ServerError> {
        let first = self.input.find(' ');
        let second =
            first.and_then(|i| self.input[i + 1..].find(' ').map(|j| i + 1 + j));
        let (Some(first), Some(second)) = (first, second) else {
            return Err(ServerError::bad_request());
        };
        self.method = Some(self.input[..first].to_string());
        self.uri = Some(codec::url_decode(&self.input[first + 1..second])?);
        Ok(())
    }

    /// The request method, once parsed.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The decoded request URI, once parsed.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Whether the response to this request may carry a body. HEAD
    /// responses are headers only.
    pub fn allows_body(&self) -> bool {
        self.method.as_deref() != Some("HEAD")
    }
}
