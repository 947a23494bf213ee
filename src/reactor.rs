//! The event loop.
//!
//! One thread multiplexes every channel through a single level-triggered
//! epoll instance. Each ready channel is dispatched to the handler
//! currently attached to it; the handler performs one bounded unit of
//! non-blocking I/O and reports the transition to apply. A failure on one
//! connection is logged and costs that connection only; it can never abort
//! the loop or disturb another channel.
//!
//! The multiplexer is level-triggered: a handler consumes as little of the
//! reported readiness as it likes (one accept, one short read) and the
//! kernel re-reports whatever is left on the next wait.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use epoll::{ControlOptions, Event, Events};
use tracing::{debug, error};

use crate::http::handler::{Handler, Next};

/// Ready events drained per wait call.
const EVENT_BATCH: usize = 256;

pub struct Reactor {
    epoll_fd: RawFd,
    /// The channel registry: each live fd maps to the handler that owns it.
    handlers: HashMap<RawFd, Handler>,
    shutdown: Arc<AtomicBool>,
    /// Read side of the wake channel; shutdown handles hold the write side.
    wake_rx: UnixStream,
    wake_tx: UnixStream,
}

/// Requests reactor termination from another thread.
#[derive(Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake: UnixStream,
}

impl ShutdownHandle {
    /// Stops the reactor promptly, even when no I/O is pending.
    /// Connections in progress are not finished.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // If the wake channel is full a wake is already pending.
        let _ = (&self.wake).write(&[0]);
    }
}

impl Reactor {
    pub fn new() -> io::Result<Reactor> {
        let epoll_fd = epoll::create(true)?;
        let (wake_tx, wake_rx) = UnixStream::pair()?;
        wake_rx.set_nonblocking(true)?;
        wake_tx.set_nonblocking(true)?;
        epoll::ctl(
            epoll_fd,
            ControlOptions::EPOLL_CTL_ADD,
            wake_rx.as_raw_fd(),
            Event::new(Events::EPOLLIN, wake_rx.as_raw_fd() as u64),
        )?;
        Ok(Reactor {
            epoll_fd,
            handlers: HashMap::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake_rx,
            wake_tx,
        })
    }

    /// A handle that can stop the loop from another thread.
    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            wake: self.wake_tx.try_clone()?,
        })
    }

    /// Attaches a handler to the multiplexer under its interest set. This
    /// is how channels enter the loop and how phase transitions re-attach
    /// them: the new handler replaces any prior attachment wholesale.
    pub fn register(&mut self, handler: Handler) -> io::Result<()> {
        let fd = handler.raw_fd();
        let event = Event::new(handler.interest(), fd as u64);
        match epoll::ctl(self.epoll_fd, ControlOptions::EPOLL_CTL_ADD, fd, event) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                epoll::ctl(self.epoll_fd, ControlOptions::EPOLL_CTL_MOD, fd, event)?
            }
            result => result?,
        }
        self.handlers.insert(fd, handler);
        Ok(())
    }

    /// Runs the dispatch loop until a shutdown handle stops it.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = [Event::new(Events::empty(), 0); EVENT_BATCH];
        while !self.shutdown.load(Ordering::SeqCst) {
            let ready = match epoll::wait(self.epoll_fd, -1, &mut events) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            for event in &events[..ready] {
                let fd = event.data as RawFd;
                if fd == self.wake_rx.as_raw_fd() {
                    self.drain_wake();
                    continue;
                }
                self.dispatch(fd);
            }
        }
        Ok(())
    }

    /// Dispatches one readiness event to the handler attached to `fd`.
    fn dispatch(&mut self, fd: RawFd) {
        // The registration may already have been closed by an earlier
        // event in the same batch.
        let Some(handler) = self.handlers.remove(&fd) else {
            return;
        };
        match handler.handle() {
            Next::Again(handler) => {
                self.handlers.insert(fd, handler);
            }
            Next::Switch(handler) => {
                if let Err(e) = self.register(handler) {
                    error!(fd, error = %e, "re-registration failed, dropping connection");
                }
            }
            Next::Open { acceptor, opened } => {
                self.handlers.insert(fd, acceptor);
                if let Err(e) = self.register(opened) {
                    error!(error = %e, "registration failed, dropping connection");
                }
            }
            Next::Close(handler) => self.close(handler),
        }
    }

    /// Closing the channel is the only cancellation primitive: the fd
    /// leaves the multiplexer and the peer sees end of stream.
    fn close(&mut self, handler: Handler) {
        let fd = handler.raw_fd();
        let _ = epoll::ctl(
            self.epoll_fd,
            ControlOptions::EPOLL_CTL_DEL,
            fd,
            Event::new(Events::empty(), 0),
        );
        debug!(fd, "connection closed");
        drop(handler);
    }

    fn drain_wake(&mut self) {
        let mut buf = [0u8; 16];
        while matches!(self.wake_rx.read(&mut buf), Ok(n) if n > 0) {}
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = epoll::close(self.epoll_fd);
    }
}
