//! Message buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForPrefix`: Need at least 4 bytes
//! - `WaitingForFrame`: Prefix parsed, need N more bytes
//!
//! # Example
//!
//! ```
//! use gridd::protocol::{Message, MessageBuffer, MessageCodec};
//!
//! let frame = MessageCodec::marshal(&Message::new("REQ_PING")).unwrap();
//!
//! let mut buffer = MessageBuffer::new();
//! assert!(buffer.push(&frame[..3]).unwrap().is_empty());
//!
//! let messages = buffer.push(&frame[3..]).unwrap();
//! assert_eq!(messages[0].name(), "REQ_PING");
//! ```

use bytes::BytesMut;

use super::wire_format::{MessageCodec, DEFAULT_MAX_MESSAGE_SIZE, FRAME_PREFIX_SIZE};
use super::Message;
use crate::error::{GriddError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the length prefix.
    WaitingForPrefix,
    /// Prefix parsed, waiting for the frame body.
    WaitingForFrame { remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct MessageBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame size.
    max_message_size: u32,
}

impl MessageBuffer {
    /// Create a new message buffer with default settings.
    ///
    /// Default capacity: 64KB, max frame: 64MB.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new message buffer with a custom max frame size.
    pub fn with_max_size(max_message_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForPrefix,
            max_message_size,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial frames stay buffered until the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a frame exceeds the max size or fails to unmarshal.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(message) = self.try_extract_one()? {
            messages.push(message);
        }

        Ok(messages)
    }

    fn try_extract_one(&mut self) -> Result<Option<Message>> {
        match self.state {
            State::WaitingForPrefix => {
                let frame_len = match MessageCodec::decode_prefix(&self.buffer) {
                    Some(len) => len,
                    None => return Ok(None),
                };

                if frame_len > self.max_message_size {
                    return Err(GriddError::Protocol(format!(
                        "Message size {} exceeds maximum {}",
                        frame_len, self.max_message_size
                    )));
                }

                let _ = self.buffer.split_to(FRAME_PREFIX_SIZE);
                self.state = State::WaitingForFrame {
                    remaining: frame_len,
                };

                self.try_extract_one()
            }

            State::WaitingForFrame { remaining } => {
                let remaining = remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let frame = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForPrefix;

                MessageCodec::unmarshal(frame).map(Some)
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if a frame is partially received.
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, State::WaitingForFrame { .. }) || !self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
