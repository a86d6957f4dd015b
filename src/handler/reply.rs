//! Reply context - accumulates and transmits one reply.
//!
//! A [`ReplyContext`] is bound to the [`RequestContext`] of the request
//! being served. Handlers set a status, optional extra headers and an
//! optional body, then the reply is marshalled and written to the client
//! with [`ReplyContext::transmit`] under a bounded deadline.
//!
//! One context may carry several replies (e.g. `206` partial replies
//! followed by a final one): [`ReplyContext::clear_partial`] resets the
//! status and body between attempts while keeping the warning and extra
//! headers, and [`ReplyContext::clear_full`] returns the context to its
//! freshly created state.
//!
//! # Example
//!
//! ```ignore
//! let mut reply = ReplyContext::new(&mut request_ctx);
//! reply.add_str_header("VERSION", "42");
//! reply.set_body_copy(b"payload");
//! reply.set_status(200, "OK");
//! reply.transmit().await?;
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tracing::{trace, warn};

use super::RequestContext;
use crate::codec::MsgPackCodec;
use crate::error::{GriddError, Result};
use crate::protocol::{status, Message, MessageCodec, FIELD_ID, FIELD_MESSAGE, FIELD_STATUS};

/// Status message sent when the handler never set one.
pub const NOMSG: &str = "NOMSG";

/// Fields filled from the reply status and the request, never from extra headers.
const RESERVED_FIELDS: [&str; 3] = [FIELD_STATUS, FIELD_MESSAGE, FIELD_ID];

/// Lower bound of the reply write deadline.
pub const MIN_REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound of the reply write deadline.
pub const MAX_REPLY_TIMEOUT: Duration = Duration::from_millis(60000);

/// Effective deadline of a reply write for a given operation timeout.
#[inline]
pub fn reply_deadline(operation_timeout: Duration) -> Duration {
    operation_timeout.clamp(MIN_REPLY_TIMEOUT, MAX_REPLY_TIMEOUT)
}

/// How a reply body came to be held by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOwnership {
    /// The context copied the caller's bytes and owns the copy.
    Copied,
    /// The caller handed its buffer over to the context.
    Transferred,
    /// The context shares a buffer the caller keeps owning.
    Borrowed,
}

/// A reply body together with its ownership mode.
#[derive(Debug, Clone)]
pub struct Body {
    data: Bytes,
    ownership: BodyOwnership,
}

impl Body {
    /// Copy `data` into a buffer owned by the body.
    pub fn copy(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            ownership: BodyOwnership::Copied,
        }
    }

    /// Take ownership of `data` without copying.
    pub fn transfer(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ownership: BodyOwnership::Transferred,
        }
    }

    /// Share `data` with the caller.
    ///
    /// Only a reference count is taken; the caller's buffer stays alive as
    /// long as the caller holds it, whatever happens to the body.
    pub fn borrow(data: &Bytes) -> Self {
        Self {
            data: data.clone(),
            ownership: BodyOwnership::Borrowed,
        }
    }

    /// Borrow a static buffer.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
            ownership: BodyOwnership::Borrowed,
        }
    }

    /// Body bytes.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Ownership mode.
    #[inline]
    pub fn ownership(&self) -> BodyOwnership {
        self.ownership
    }

    /// Body length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Non-fatal condition recorded by a handler alongside its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyWarning {
    /// Status-like code.
    pub code: i32,
    /// Human readable message.
    pub message: String,
}

/// Mutable accumulator for the reply to one request.
///
/// Exclusively owned by the task serving the request.
pub struct ReplyContext<'r, 's> {
    request_ctx: &'r mut RequestContext<'s>,
    code: i32,
    message: Option<String>,
    body: Option<Body>,
    extra_headers: Option<BTreeMap<String, Bytes>>,
    warning: Option<ReplyWarning>,
    finalized: bool,
}

impl<'r, 's> ReplyContext<'r, 's> {
    /// Create an empty reply bound to `request_ctx`.
    pub fn new(request_ctx: &'r mut RequestContext<'s>) -> Self {
        Self {
            request_ctx,
            code: 0,
            message: None,
            body: None,
            extra_headers: None,
            warning: None,
            finalized: false,
        }
    }

    /// The request being answered.
    #[inline]
    pub fn request(&self) -> &'s Message {
        self.request_ctx.request()
    }

    /// The bound request context.
    #[inline]
    pub fn request_context(&self) -> &RequestContext<'s> {
        self.request_ctx
    }

    /// Set the status code and message, replacing any previous pair.
    pub fn set_status(&mut self, code: i32, message: impl Into<String>) {
        self.code = code;
        self.message = Some(message.into());
        trace!(code, message = ?self.message, "reply status set");
    }

    /// Set the status code and drop any previous message.
    pub fn set_code(&mut self, code: i32) {
        self.code = code;
        self.message = None;
        trace!(code, "reply status set");
    }

    /// Current status code, `0` until set.
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Current status message, if set.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Replace the body.
    ///
    /// The previous body is released first. An empty body is not stored,
    /// so setting one leaves the reply without a body.
    pub fn set_body(&mut self, body: Body) {
        self.body = None;
        if body.is_empty() {
            return;
        }
        trace!(size = body.len(), ownership = ?body.ownership(), "reply body set");
        self.body = Some(body);
    }

    /// Copy `data` into the body.
    pub fn set_body_copy(&mut self, data: &[u8]) {
        self.set_body(Body::copy(data));
    }

    /// Hand `data` over to the body.
    pub fn set_body_owned(&mut self, data: impl Into<Bytes>) {
        self.set_body(Body::transfer(data));
    }

    /// Share the caller's `data` as the body.
    pub fn set_body_borrowed(&mut self, data: &Bytes) {
        self.set_body(Body::borrow(data));
    }

    /// Encode `value` as MsgPack into the body.
    pub fn set_body_encoded<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let encoded = MsgPackCodec::encode(value)?;
        self.set_body_owned(encoded);
        Ok(())
    }

    /// Current body, if set.
    #[inline]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Ownership mode of the current body.
    #[inline]
    pub fn body_ownership(&self) -> Option<BodyOwnership> {
        self.body.as_ref().map(Body::ownership)
    }

    /// Add an extra header, copying key and value.
    ///
    /// Re-adding a key overwrites its value. Empty keys or values are ignored,
    /// as are the reserved reply fields (`STATUS`, `MSG`, `ID`).
    pub fn add_header(&mut self, key: &str, value: &[u8]) {
        if key.is_empty() || value.is_empty() {
            return;
        }
        if RESERVED_FIELDS.contains(&key) {
            warn!(key, "reserved reply field ignored as extra header");
            return;
        }
        self.extra_headers
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_owned(), Bytes::copy_from_slice(value));
    }

    /// Add a text extra header.
    pub fn add_str_header(&mut self, key: &str, value: &str) {
        self.add_header(key, value.as_bytes());
    }

    /// Extra headers, if any were ever added since the last full clear.
    #[inline]
    pub fn extra_headers(&self) -> Option<&BTreeMap<String, Bytes>> {
        self.extra_headers.as_ref()
    }

    /// Record a warning.
    pub fn set_warning(&mut self, code: i32, message: impl Into<String>) {
        self.warning = Some(ReplyWarning {
            code,
            message: message.into(),
        });
    }

    /// Recorded warning, if any.
    #[inline]
    pub fn warning(&self) -> Option<&ReplyWarning> {
        self.warning.as_ref()
    }

    /// Whether a final (non-partial) reply was transmitted.
    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Release status and body; with `full`, also the warning and extra headers.
    pub fn clear(&mut self, full: bool) {
        if full {
            self.warning = None;
            self.extra_headers = None;
        }
        self.code = 0;
        self.message = None;
        self.body = None;
    }

    /// Reset status and body, keeping the warning and extra headers.
    pub fn clear_partial(&mut self) {
        self.clear(false);
    }

    /// Return to the freshly created state.
    pub fn clear_full(&mut self) {
        self.clear(true);
    }

    /// Marshal the accumulated reply and write it to the client.
    ///
    /// The write deadline is the server operation timeout clamped by
    /// [`reply_deadline`]. The accumulated state is kept, so the caller may
    /// clear and reuse the context.
    ///
    /// # Errors
    ///
    /// - `AllocationFailure` or `Protocol` if marshalling fails.
    /// - `TransmissionFailure` if the write times out, fails, or accepts
    ///   fewer bytes than the encoded reply.
    pub async fn transmit(&mut self) -> Result<()> {
        let encoded = MessageCodec::marshal(&self.build_message())?;
        let deadline = reply_deadline(self.request_ctx.operation_timeout());

        let outcome = self
            .request_ctx
            .socket()
            .write_with_deadline(deadline, &encoded)
            .await;

        let expected = encoded.len();
        drop(encoded);

        let result = match outcome {
            Ok(sent) if sent > 0 && sent == expected => Ok(()),
            Ok(sent) => Err(GriddError::transmission(format!(
                "short write ({}/{} bytes)",
                sent, expected
            ))),
            Err(e) => Err(GriddError::transmission(e)),
        };

        match &result {
            Ok(()) => {
                if status::is_final(self.code) {
                    self.finalized = true;
                }
                trace!(code = self.code, size = expected, "reply sent");
            }
            Err(e) => {
                warn!(
                    peer = %self.request_ctx.remote_addr(),
                    code = self.code,
                    error = %e,
                    "reply transmission failed"
                );
            }
        }

        result
    }

    fn build_message(&self) -> Message {
        let text = self.message.as_deref().unwrap_or(NOMSG);
        let mut reply = Message::reply_to(self.request(), self.code, text);

        if let Some(headers) = &self.extra_headers {
            for (key, value) in headers.iter().filter(|(_, v)| !v.is_empty()) {
                reply.set_field(key.as_str(), value.clone());
            }
        }

        if let Some(body) = self.body.as_ref().filter(|b| !b.is_empty()) {
            reply.set_body(body.data().clone());
        }

        reply
    }
}
