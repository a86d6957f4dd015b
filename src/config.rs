//! Server configuration.
//!
//! Loaded from TOML; every key is optional and falls back to its default.
//!
//! ```toml
//! bind_address = "0.0.0.0:6000"
//! operation_timeout_ms = 30000
//! max_connections = 256
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// Settings for one request server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP `host:port`, or a Unix socket path starting with `/`.
    pub bind_address: String,
    /// Default operation timeout in milliseconds. Reply writes use it
    /// clamped into `[1000, 60000]`.
    pub operation_timeout_ms: u64,
    /// Maximum number of connections served at once.
    pub max_connections: usize,
    /// Largest accepted request frame, in bytes.
    pub max_message_size: u32,
    /// Socket read buffer size, in bytes.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:6000".to_string(),
            operation_timeout_ms: 30_000,
            max_connections: 256,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Default operation timeout.
    #[inline]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
