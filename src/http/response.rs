//! HTTP response representation and serialization.

use std::io::{self, Write};

use crate::http::codec;
use crate::http::content::Content;

const HTTP_VERSION: &str = "HTTP/1.1";
const CRLF: &str = "\r\n";

/// The value sent in the `Server` header.
pub const SERVER_NAME: &str = concat!("skiff/", env!("CARGO_PKG_VERSION"));

/// A response under construction: status, headers in the order they will
/// appear on the wire, and the optional content the write phase streams
/// after the header block.
#[derive(Debug)]
pub struct Response {
    code: u16,
    reason: String,
    headers: Vec<(String, String)>,
    content: Option<Content>,
}

impl Response {
    /// Creates a 200 OK response carrying the standard header set. Every
    /// response closes its connection.
    pub fn new() -> Self {
        let mut response = Response {
            code: 200,
            reason: "OK".to_string(),
            headers: Vec::new(),
            content: None,
        };
        response.add_header("Server", SERVER_NAME);
        response.add_header("Connection", "close");
        response
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Appends a header line.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    /// Looks up the first header with this name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attaches the content to stream after the header block, describing it
    /// with `Content-Length` and `Content-Type` headers where known.
    pub fn set_content(&mut self, content: Content) {
        self.describe_content(&content);
        self.content = Some(content);
    }

    /// Adds the `Content-Length`/`Content-Type` headers for `content`
    /// without attaching it. Responses to HEAD requests describe the
    /// resource but never send it.
    pub fn describe_content(&mut self, content: &Content) {
        if let Some(size) = content.size() {
            self.add_header("Content-Length", size.to_string());
        }
        if let Some(mime) = content.content_type() {
            self.add_header("Content-Type", mime.to_string());
        }
    }

    /// Turns this response into an error response: sets the status and,
    /// when the request permits one, a small HTML document naming the
    /// error. Headers already added are kept.
    pub fn set_error(&mut self, code: u16, reason: &str, send_body: bool) {
        self.code = code;
        self.reason = reason.to_string();

        if send_body {
            let body = format!(
                "<html><head><title>{code} {reason}</title></head>\
                 <body><h1>{code} {reason}</h1></body></html>\n"
            );
            self.set_content(Content::buffer(codec::encode(&body), Some("text/html")));
        } else {
            self.content = None;
        }
    }

    /// Serializes the status line and header block, terminated by the
    /// blank line separating headers from content.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut text = format!("{HTTP_VERSION} {} {}{CRLF}", self.code, self.reason);
        for (name, value) in &self.headers {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push_str(CRLF);
        }
        text.push_str(CRLF);
        codec::encode(&text)
    }

    /// Writes the serialized header block to the channel.
    pub fn write_header(&self, to: &mut impl Write) -> io::Result<()> {
        to.write_all(&self.header_bytes())
    }

    /// Hands the content over to the write phase.
    pub fn into_content(self) -> Option<Content> {
        self.content
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
