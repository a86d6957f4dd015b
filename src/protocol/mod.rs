//! Protocol module - message model, wire format and framing.
//!
//! This module implements the request/reply wire protocol:
//! - Length-prefixed message frames (marshal/unmarshal)
//! - Message buffer for accumulating partial reads
//! - Message struct with typed accessors
//! - Reply status codes

mod message;
mod message_buffer;
pub mod status;
mod wire_format;

pub use message::{Message, FIELD_ID, FIELD_MESSAGE, FIELD_STATUS, REPLY_NAME};
pub use message_buffer::MessageBuffer;
pub use wire_format::{
    MessageCodec, DEFAULT_MAX_MESSAGE_SIZE, FRAME_PREFIX_SIZE, MAX_KEY_LEN, MAX_NAME_LEN,
};
