//! Skiff - a single-threaded, event-driven static file web server.
//!
//! All I/O is multiplexed through one epoll instance; each connection is a
//! small state machine advanced one non-blocking step at a time. See
//! [`reactor`] for the event loop and [`http::handler`] for the connection
//! lifecycle.

pub mod config;
pub mod files;
pub mod http;
pub mod reactor;
