//! The per-connection state machine.
//!
//! Each live channel is attached to exactly one `Handler` representing the
//! phase of its lifecycle:
//!
//! ```text
//! ACCEPTING --(accept event)-----------------------------> READING
//! READING   --(partial read)-----------------------------> READING
//! READING   --(request complete, response header sent)---> WRITING
//! READING   --(read failure or EOF)----------------------> CLOSED
//! WRITING   --(content not yet drained)------------------> WRITING
//! WRITING   --(content drained or absent)----------------> CLOSED
//! ```
//!
//! A handler performs one bounded unit of non-blocking I/O per invocation
//! and hands control back to the reactor with a [`Next`] value describing
//! the transition to apply. Every piece of phase-local state lives inside
//! the handler that is using it, so replacing the attachment transfers
//! ownership of the connection in one step.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use epoll::Events;
use tracing::{debug, error, info};

use crate::files::FileServer;
use crate::http::codec;
use crate::http::content::Content;
use crate::http::error::ServerError;
use crate::http::request::Request;
use crate::http::response::Response;

/// Bytes per bounded read in the request phase.
const READ_CHUNK: usize = 4096;

/// What the reactor should do with the channel after a dispatch.
pub enum Next {
    /// Stay in the current phase; wait for the same readiness again.
    Again(Handler),
    /// Move to the next phase; the channel is re-registered under the new
    /// handler's interest set.
    Switch(Handler),
    /// A new connection was accepted: the acceptor stays in place and the
    /// new handler is registered alongside it.
    Open { acceptor: Handler, opened: Handler },
    /// The connection is finished or failed; deregister and drop it.
    Close(Handler),
}

pub enum Handler {
    Acceptor(Acceptor),
    Reader(RequestReader),
    Writer(ResponseWriter),
}

impl Handler {
    /// A listening handler that produces one `RequestReader` per accepted
    /// connection. It never transitions away.
    pub fn acceptor(listener: TcpListener, files: Arc<FileServer>) -> Handler {
        Handler::Acceptor(Acceptor { listener, files })
    }

    /// The readiness condition this handler waits for.
    pub fn interest(&self) -> Events {
        match self {
            Handler::Acceptor(_) | Handler::Reader(_) => Events::EPOLLIN,
            Handler::Writer(_) => Events::EPOLLOUT,
        }
    }

    /// The file descriptor of the owned channel.
    pub fn raw_fd(&self) -> RawFd {
        match self {
            Handler::Acceptor(h) => h.listener.as_raw_fd(),
            Handler::Reader(h) => h.stream.as_raw_fd(),
            Handler::Writer(h) => h.stream.as_raw_fd(),
        }
    }

    /// Performs this phase's single bounded unit of work.
    pub fn handle(self) -> Next {
        match self {
            Handler::Acceptor(h) => h.handle(),
            Handler::Reader(h) => h.handle(),
            Handler::Writer(h) => h.handle(),
        }
    }
}

pub struct Acceptor {
    listener: TcpListener,
    files: Arc<FileServer>,
}

impl Acceptor {
    /// Accepts one pending connection. Only one per readiness event: the
    /// selector reports the listener again while more are queued, so
    /// accepts compete fairly with ordinary connection events.
    fn handle(self) -> Next {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    error!(%peer, error = %e, "failed to configure accepted connection");
                    return Next::Again(Handler::Acceptor(self));
                }
                debug!(%peer, "accepted connection");
                let reader = RequestReader {
                    stream,
                    peer,
                    request: Request::new(),
                    files: Arc::clone(&self.files),
                };
                Next::Open {
                    acceptor: Handler::Acceptor(self),
                    opened: Handler::Reader(reader),
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Next::Again(Handler::Acceptor(self)),
            Err(e) => {
                error!(error = %e, "accept failed");
                Next::Again(Handler::Acceptor(self))
            }
        }
    }
}

pub struct RequestReader {
    stream: TcpStream,
    peer: SocketAddr,
    request: Request,
    files: Arc<FileServer>,
}

impl RequestReader {
    /// Reads the bytes currently available and appends them to the
    /// request. Partial requests stay in this phase; a complete request
    /// advances to the write phase.
    fn handle(mut self) -> Next {
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(0) => {
                debug!(peer = %self.peer, "peer closed connection before request completed");
                Next::Close(Handler::Reader(self))
            }
            Ok(n) => {
                let text = codec::decode(&chunk[..n]);
                if self.request.append(&text) {
                    self.respond()
                } else if self.request.oversized() {
                    self.reject()
                } else {
                    Next::Again(Handler::Reader(self))
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Next::Again(Handler::Reader(self)),
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "read failed");
                Next::Close(Handler::Reader(self))
            }
        }
    }

    /// The request is complete: parse it, resolve it, and move to the
    /// write phase. Protocol failures become error responses; resolution
    /// failures below the protocol level are mapped to a generic 500 so
    /// the peer still gets a well-formed answer.
    fn respond(mut self) -> Next {
        let mut response = Response::new();

        let resolved = self
            .request
            .parse()
            .and_then(|()| self.files.resolve(&self.request, &mut response));
        match resolved {
            Ok(()) => {}
            Err(ServerError::Protocol { code, reason }) => {
                response.set_error(code, &reason, self.request.allows_body());
            }
            Err(ServerError::Io(e)) => {
                error!(peer = %self.peer, error = %e, "request resolution failed");
                response.set_error(500, "Internal server error", self.request.allows_body());
            }
        }

        info!(
            peer = %self.peer,
            method = self.request.method().unwrap_or("-"),
            uri = self.request.uri().unwrap_or("-"),
            code = response.code(),
            reason = response.reason(),
            "request"
        );

        self.transition(response)
    }

    /// The accumulator outgrew the request size cap without completing;
    /// answer 413 without parsing.
    fn reject(self) -> Next {
        let mut response = Response::new();
        response.set_error(413, "Request entity too large", self.request.allows_body());
        info!(peer = %self.peer, code = 413_u16, "request rejected");
        self.transition(response)
    }

    /// Sends the header block and re-attaches the channel as the write
    /// phase, which streams the content (if any) and closes.
    fn transition(mut self, response: Response) -> Next {
        if let Err(e) = response.write_header(&mut self.stream) {
            debug!(peer = %self.peer, error = %e, "failed to write response header");
            return Next::Close(Handler::Reader(self));
        }
        let writer = ResponseWriter {
            stream: self.stream,
            peer: self.peer,
            content: response.into_content(),
        };
        Next::Switch(Handler::Writer(writer))
    }
}

pub struct ResponseWriter {
    stream: TcpStream,
    peer: SocketAddr,
    content: Option<Content>,
}

impl ResponseWriter {
    /// Pushes more content to the peer; closes once everything is out.
    /// A connection serves exactly one request, so draining is terminal.
    fn handle(mut self) -> Next {
        let drained = match self.content.as_mut() {
            None => true,
            Some(content) => match content.write_to(&mut self.stream) {
                Ok(drained) => drained,
                Err(e) => {
                    debug!(peer = %self.peer, error = %e, "write failed");
                    true
                }
            },
        };

        if drained {
            Next::Close(Handler::Writer(self))
        } else {
            Next::Again(Handler::Writer(self))
        }
    }
}
