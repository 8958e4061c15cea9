//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::frame::DEFAULT_MAX_PARAMS;

/// Default size of the inbound frame buffer in bytes.
pub const DEFAULT_MAX_COMMAND_BUFFER: usize = 500;

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inbound buffer capacity. A frame longer than this is discarded.
    pub max_command_buffer: usize,

    /// Maximum parameters accepted in one frame.
    pub max_command_params: usize,

    /// Send a heartbeat when nothing has been sent for this many milliseconds.
    pub heartbeat_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_command_buffer: DEFAULT_MAX_COMMAND_BUFFER,
            max_command_params: DEFAULT_MAX_PARAMS,
            heartbeat_ms: None,
        }
    }
}

impl SessionConfig {
    /// Enable heartbeats at the given interval.
    pub fn with_heartbeat(mut self, interval_ms: u64) -> Self {
        self.heartbeat_ms = Some(interval_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_command_buffer, 500);
        assert_eq!(config.max_command_params, 50);
        assert_eq!(config.heartbeat_ms, None);
        assert_eq!(config.with_heartbeat(2000).heartbeat_ms, Some(2000));
    }
}
