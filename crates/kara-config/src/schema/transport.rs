use std::time::Duration;

use kara_common::env::host_port;
use serde::{Deserialize, Serialize};

/// Socket server settings for the transport hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Loopback interface the hub binds to. Renderers receive it as a
    /// startup parameter and dial the same host, so it must be one of
    /// `127.0.0.0/8`, `::1` or `localhost`.
    pub host: String,
    /// Port to bind. `0` lets the OS pick an unused ephemeral port.
    pub port: u16,
    /// How long a dropped connection may take to re-register before the
    /// window is treated as closed (valid range: 1-60000).
    pub grace_period_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            grace_period_ms: 200,
        }
    }
}

impl TransportConfig {
    pub fn bind_addr(&self) -> String {
        host_port(&self.host, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
