//! Real-time transport configuration.

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) transport configuration.
///
/// Reconnection is handled entirely by the transport; the backoff settings
/// here bound its retry delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Base WebSocket URL; the namespace is appended as a path segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Handshake timeout in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,
    /// Timeout for acknowledged publishes in seconds.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_seconds: u64,
    /// Initial reconnect backoff delay in milliseconds.
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_delay_ms: u64,
    /// Maximum reconnect backoff delay in milliseconds.
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_delay_ms: u64,
    /// Outbound message buffer size.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            handshake_timeout_seconds: default_handshake_timeout(),
            ack_timeout_seconds: default_ack_timeout(),
            reconnect_initial_delay_ms: default_reconnect_initial(),
            reconnect_max_delay_ms: default_reconnect_max(),
            outbound_buffer_size: default_outbound_buffer(),
        }
    }
}

fn default_base_url() -> String {
    "ws://127.0.0.1:8080/rt".to_string()
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_ack_timeout() -> u64 {
    10
}

fn default_reconnect_initial() -> u64 {
    500
}

fn default_reconnect_max() -> u64 {
    30_000
}

fn default_outbound_buffer() -> usize {
    64
}
