//! Coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a mesh coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Instance name, attached to every log line from this coordinator
    pub name: String,
    /// Deadline for one offer/answer/finish exchange, in milliseconds
    pub handshake_timeout_ms: u64,
    /// Capacity of the mesh event broadcast channel
    pub event_buffer_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "mesh".to_string(),
            handshake_timeout_ms: 5_000,
            event_buffer_size: 1024,
        }
    }
}

impl CoordinatorConfig {
    /// Create a config for testing (short handshake deadline)
    pub fn testing() -> Self {
        Self {
            name: "test-mesh".to_string(),
            handshake_timeout_ms: 200,
            event_buffer_size: 256,
        }
    }

    /// Set the instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the handshake deadline
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Handshake deadline as a duration
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
