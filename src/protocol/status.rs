//! Reply status codes.
//!
//! Codes below 200 and 206 are intermediate: a handler may send any number
//! of them before the single final reply.

/// Request processed, final reply.
pub const OK: i32 = 200;

/// Intermediate reply, more replies follow.
pub const PARTIAL_CONTENT: i32 = 206;

/// Malformed or unexpected request.
pub const BAD_REQUEST: i32 = 400;

/// Target not found.
pub const NOT_FOUND: i32 = 404;

/// Handler failure.
pub const INTERNAL_ERROR: i32 = 500;

/// Check if a reply with this code ends the request.
#[inline]
pub fn is_final(code: i32) -> bool {
    code >= OK && code != PARTIAL_CONTENT
}
