//! Listener, heartbeat, and CORS settings.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_size: usize,
    /// Ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a connection after this long without a pong.
    pub heartbeat_timeout_ms: u64,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_connections: 1024,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            send_queue_size: 64,
            heartbeat_interval_ms: 25_000,
            heartbeat_timeout_ms: 60_000,
            allowed_origins: vec!["http://localhost:8010".to_string()],
        }
    }
}
