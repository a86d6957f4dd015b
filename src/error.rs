//! Error types for gridd.

use std::collections::TryReserveError;

use thiserror::Error;

/// Prefix carried by every transmission failure.
pub const REPLY_FAILURE_PREFIX: &str = "Failed to reply: ";

/// Main error type for all gridd operations.
#[derive(Debug, Error)]
pub enum GriddError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A registration call was missing its name, matcher or handler.
    #[error("Invalid parameter: {0}")]
    InvalidArgument(&'static str),

    /// The marshaller could not allocate the encoded reply.
    #[error("Allocation failure: {0}")]
    AllocationFailure(#[from] TryReserveError),

    /// The bounded reply write timed out, came up short or failed.
    #[error("{}{}", REPLY_FAILURE_PREFIX, .0)]
    TransmissionFailure(String),

    /// Malformed frame or message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No registered matcher accepted the request.
    #[error("No handler found for request: {0}")]
    HandlerNotFound(String),

    /// A handler refused the request with an explicit status.
    #[error("{message}")]
    Handler {
        /// Status code to reply with.
        code: i32,
        /// Human readable reason.
        message: String,
    },

    /// JSON serialization error (service advertisement).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// The configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl GriddError {
    /// Build a handler error carrying the status code to reply with.
    pub fn reply(code: i32, message: impl Into<String>) -> Self {
        Self::Handler {
            code,
            message: message.into(),
        }
    }

    /// Build a transmission failure from its underlying cause.
    pub(crate) fn transmission(cause: impl std::fmt::Display) -> Self {
        Self::TransmissionFailure(cause.to_string())
    }
}

/// Result type alias using GriddError.
pub type Result<T> = std::result::Result<T, GriddError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmission_failure_carries_prefix() {
        let err = GriddError::transmission("short write (3/10 bytes)");
        assert!(err.to_string().starts_with(REPLY_FAILURE_PREFIX));
        assert_eq!(err.to_string(), "Failed to reply: short write (3/10 bytes)");
    }

    #[test]
    fn test_handler_error_displays_message_only() {
        let err = GriddError::reply(404, "no such container");
        assert_eq!(err.to_string(), "no such container");
        assert!(matches!(err, GriddError::Handler { code: 404, .. }));
    }

    #[test]
    fn test_allocation_failure_from_try_reserve() {
        let mut v: Vec<u8> = Vec::new();
        let err: GriddError = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(matches!(err, GriddError::AllocationFailure(_)));
    }
}
