//! Connection manager configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::writer::DEFAULT_CHANNEL_CAPACITY;

/// Default read buffer size per connection.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// How frames from one connection are handed to handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Each handler runs on its own task; frames from one connection may
    /// complete out of order.
    #[default]
    FireAndForget,
    /// The next frame from a connection is dispatched only after the
    /// previous handler finished.
    Sequential,
}

/// Options applied by [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Largest payload accepted on an inbound envelope.
    pub max_payload_size: u32,
    /// Bytes read from the socket per call.
    pub read_buffer_size: usize,
    /// Outbound envelopes queued per connection before senders wait.
    pub channel_capacity: usize,
    /// Handler scheduling per connection.
    pub dispatch_mode: DispatchMode,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dispatch_mode: DispatchMode::FireAndForget,
        }
    }
}

impl ServerOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the dispatch mode.
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Set the inbound payload cap.
    pub fn with_max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ServerOptions::default();
        assert_eq!(options.max_payload_size, 16 * 1024 * 1024);
        assert_eq!(options.dispatch_mode, DispatchMode::FireAndForget);
    }

    #[test]
    fn test_partial_json() {
        let options = ServerOptions::from_json(r#"{"dispatch_mode": "sequential"}"#).unwrap();
        assert_eq!(options.dispatch_mode, DispatchMode::Sequential);
        assert_eq!(options.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);

        let empty = ServerOptions::from_json("{}").unwrap();
        assert_eq!(empty, ServerOptions::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(ServerOptions::from_json(r#"{"dispatch_mode": "parallel"}"#).is_err());
    }
}
