//! Network configuration types for the processor server.

use std::time::Duration;

/// Transport settings applied by the server builder.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}
