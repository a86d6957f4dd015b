//! Wire format encoding and decoding.
//!
//! Every message travels as one length-prefixed frame:
//! ```text
//! ┌──────────┬──────────┬────────┬─────────────┬────────┬──────────┬──────┐
//! │ Length   │ Name len │ Name   │ Field count │ Fields │ Body len │ Body │
//! │ uint32 BE│ uint8    │ N bytes│ uint16 BE   │  ...   │ uint32 BE│      │
//! └──────────┴──────────┴────────┴─────────────┴────────┴──────────┴──────┘
//! ```
//!
//! Each field is `key len (uint16 BE) | key | value len (uint32 BE) | value`.
//! `Length` counts the bytes following the prefix.
//!
//! All multi-byte integers are Big Endian.

use bytes::{Buf, Bytes};

use super::Message;
use crate::error::{GriddError, Result};

/// Frame length prefix size in bytes.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Default maximum frame size (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024;

/// Longest message name the format can carry.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Longest field key the format can carry.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Marshalling codec for [`Message`] frames.
///
/// Stateless marker struct, like the payload codecs.
pub struct MessageCodec;

impl MessageCodec {
    /// Size of the frame body (without the length prefix).
    pub fn encoded_len(message: &Message) -> usize {
        let fields: usize = message
            .fields()
            .map(|(k, v)| 2 + k.len() + 4 + v.len())
            .sum();
        1 + message.name().len() + 2 + fields + 4 + message.body().map_or(0, |b| b.len())
    }

    /// Marshal a message into a complete frame, prefix included.
    ///
    /// # Errors
    ///
    /// - `AllocationFailure` if the output buffer cannot be reserved.
    /// - `Protocol` if a name, key, count or size exceeds the format limits.
    pub fn marshal(message: &Message) -> Result<Bytes> {
        if message.name().len() > MAX_NAME_LEN {
            return Err(GriddError::Protocol(format!(
                "Message name length {} exceeds maximum {}",
                message.name().len(),
                MAX_NAME_LEN
            )));
        }
        if message.field_count() > u16::MAX as usize {
            return Err(GriddError::Protocol(format!(
                "Field count {} exceeds maximum {}",
                message.field_count(),
                u16::MAX
            )));
        }

        let len = Self::encoded_len(message);
        let frame_len = u32::try_from(len).map_err(|_| {
            GriddError::Protocol(format!("Frame size {} exceeds maximum {}", len, u32::MAX))
        })?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(FRAME_PREFIX_SIZE + len)?;

        buf.extend_from_slice(&frame_len.to_be_bytes());
        buf.push(message.name().len() as u8);
        buf.extend_from_slice(message.name().as_bytes());
        buf.extend_from_slice(&(message.field_count() as u16).to_be_bytes());

        for (key, value) in message.fields() {
            if key.len() > MAX_KEY_LEN {
                return Err(GriddError::Protocol(format!(
                    "Field key length {} exceeds maximum {}",
                    key.len(),
                    MAX_KEY_LEN
                )));
            }
            buf.extend_from_slice(&(key.len() as u16).to_be_bytes());
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
            buf.extend_from_slice(value);
        }

        let body = message.body().map_or(&[][..], |b| &b[..]);
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(body);

        Ok(Bytes::from(buf))
    }

    /// Unmarshal a frame body (prefix already stripped).
    ///
    /// Field values and the body are zero-copy slices of `frame`.
    pub fn unmarshal(frame: Bytes) -> Result<Message> {
        let mut reader = FrameReader { buf: frame };

        let name_len = reader.u8()? as usize;
        let name = reader.utf8(name_len, "message name")?;
        let mut message = Message::new(name);

        let count = reader.u16()?;
        for _ in 0..count {
            let key_len = reader.u16()? as usize;
            let key = reader.utf8(key_len, "field key")?;
            let value_len = reader.u32()? as usize;
            let value = reader.take(value_len)?;
            message.set_field(key, value);
        }

        let body_len = reader.u32()? as usize;
        let body = reader.take(body_len)?;
        message.set_body(body);

        if reader.buf.has_remaining() {
            return Err(GriddError::Protocol(format!(
                "{} trailing bytes after message body",
                reader.buf.remaining()
            )));
        }

        Ok(message)
    }

    /// Read the frame length from a prefix.
    ///
    /// Returns `None` if fewer than 4 bytes are available.
    pub fn decode_prefix(buf: &[u8]) -> Option<u32> {
        if buf.len() < FRAME_PREFIX_SIZE {
            return None;
        }
        Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
    }
}

/// Bounds-checked cursor over a frame body.
struct FrameReader {
    buf: Bytes,
}

impl FrameReader {
    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(GriddError::Protocol(format!(
                "Truncated frame: need {} bytes, have {}",
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn take(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        Ok(self.buf.split_to(n))
    }

    fn utf8(&mut self, n: usize, what: &str) -> Result<String> {
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| GriddError::Protocol(format!("Invalid UTF-8 in {}", what)))
    }
}
