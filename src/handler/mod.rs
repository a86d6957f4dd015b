//! Handler module - request dispatch and reply assembly.
//!
//! Provides:
//! - [`HandlerRegistry`] - ordered (matcher, handler) pairs, newest first
//! - [`RequestContext`] - the connection, timing and addresses of one request
//! - [`ReplyContext`] - accumulates status, headers and body, then transmits
//! - [`ServiceTag`] - capability descriptors declared by tagged handlers
//!
//! # Example
//!
//! ```ignore
//! use gridd::handler::{HandlerRegistry, ReplyContext};
//! use gridd::protocol::Message;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(
//!     "echo",
//!     |req: &Message| req.name() == "REQ_ECHO",
//!     |req: &Message, reply: &mut ReplyContext<'_, '_>| {
//!         if let Some(body) = req.body() {
//!             reply.set_body_borrowed(body);
//!         }
//!         reply.set_status(200, "OK");
//!         Ok(())
//!     },
//! )?;
//! ```

pub mod builtin;
mod context;
mod registry;
mod reply;
mod tags;

pub use context::{RequestContext, DEFAULT_OPERATION_TIMEOUT};
pub use registry::{
    BoxFuture, Handler, HandlerEntry, HandlerKind, HandlerRegistry, HandlerResult, Matcher,
    TaggedHandler, MAX_HANDLER_NAME_LEN,
};
pub use reply::{
    reply_deadline, Body, BodyOwnership, ReplyContext, ReplyWarning, MAX_REPLY_TIMEOUT,
    MIN_REPLY_TIMEOUT, NOMSG,
};
pub use tags::{ServiceTag, TagValue};
