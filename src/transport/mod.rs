//! Transport module - listening sockets and bounded reply writes.
//!
//! Provides abstraction over:
//! - TCP sockets
//! - Unix Domain Sockets (Linux/macOS)

mod connection;
mod listener;

pub use connection::{write_with_deadline, AddrInfo, Connection};
pub use listener::{Accepted, BoxedReader, Listener};
