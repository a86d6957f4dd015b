//! # gridd
//!
//! Request dispatch and reply assembly for a socket-based request/reply
//! server node of a distributed storage system.
//!
//! ## Architecture
//!
//! - **Registry**: ordered (matcher, handler) pairs; the most recently
//!   registered matching handler serves a request
//! - **Request context**: connection, start time and endpoint addresses
//! - **Reply context**: status, extra headers and body, transmitted once
//!   under a bounded deadline
//! - **Wire protocol**: length-prefixed frames of named messages
//!
//! ## Example
//!
//! ```ignore
//! use gridd::handler::ReplyContext;
//! use gridd::protocol::Message;
//! use gridd::Server;
//!
//! #[tokio::main]
//! async fn main() -> gridd::Result<()> {
//!     let server = Server::builder()
//!         .handle(
//!             "echo",
//!             |req: &Message| req.name() == "REQ_ECHO",
//!             |req: &Message, reply: &mut ReplyContext<'_, '_>| {
//!                 if let Some(body) = req.body() {
//!                     reply.set_body_borrowed(body);
//!                 }
//!                 reply.set_status(200, "OK");
//!                 Ok(())
//!             },
//!         )?
//!         .bind()
//!         .await?;
//!
//!     server.run().await
//! }
//! ```

pub mod advertise;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod namespace;
pub mod protocol;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use error::{GriddError, Result};
pub use handler::{HandlerRegistry, ReplyContext, RequestContext};
pub use server::{Server, ServerBuilder};
