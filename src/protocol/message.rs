//! Message struct with typed accessors.
//!
//! A message is a name, a set of named byte-valued fields and an optional
//! body. Requests and replies share the same shape; replies are named
//! [`REPLY_NAME`] and carry their status in the [`FIELD_STATUS`] field.
//! Field values and the body use `bytes::Bytes` for zero-copy sharing.
//!
//! # Example
//!
//! ```
//! use gridd::protocol::Message;
//!
//! let request = Message::new("REQ_PING").with_field("ID", "req-1");
//! let reply = Message::reply_to(&request, 200, "OK");
//!
//! assert_eq!(reply.status(), Some(200));
//! assert_eq!(reply.field_str("MSG"), Some("OK"));
//! assert_eq!(reply.field_str("ID"), Some("req-1"));
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;

/// Name given to every reply message.
pub const REPLY_NAME: &str = "RP";

/// Field holding the decimal status code of a reply.
pub const FIELD_STATUS: &str = "STATUS";

/// Field holding the status message of a reply.
pub const FIELD_MESSAGE: &str = "MSG";

/// Field holding the request identifier, echoed back in replies.
pub const FIELD_ID: &str = "ID";

/// A protocol message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    name: String,
    fields: BTreeMap<String, Bytes>,
    body: Option<Bytes>,
}

impl Message {
    /// Create an empty message with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            body: None,
        }
    }

    /// Build the reply template for `request`.
    ///
    /// The reply carries the status code, the status message and the
    /// request's `ID` field when the request had one.
    pub fn reply_to(request: &Message, code: i32, message: &str) -> Self {
        let mut reply = Message::new(REPLY_NAME);
        if let Some(id) = request.field(FIELD_ID) {
            reply.set_field(FIELD_ID, id.clone());
        }
        reply.set_field(FIELD_STATUS, code.to_string());
        reply.set_field(FIELD_MESSAGE, message.to_owned());
        reply
    }

    /// Builder-style variant of [`set_field`](Self::set_field).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Builder-style variant of [`set_body`](Self::set_body).
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.set_body(body);
        self
    }

    /// Message name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or overwrite a field.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Get a field value.
    #[inline]
    pub fn field(&self, key: &str) -> Option<&Bytes> {
        self.fields.get(key)
    }

    /// Get a field value as UTF-8 text.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Iterate over all fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Set the body. An empty body clears it.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
    }

    /// Get the body, if any.
    #[inline]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Status code of a reply, parsed from the `STATUS` field.
    pub fn status(&self) -> Option<i32> {
        self.field_str(FIELD_STATUS)?.parse().ok()
    }

    /// Check if this is a reply message.
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.name == REPLY_NAME
    }
}
