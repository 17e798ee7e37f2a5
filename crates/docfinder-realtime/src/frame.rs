//! Wire frame definitions for the real-time gateway.
//!
//! The envelope is deliberately small: named events carrying a JSON
//! payload, with an optional ack id for acknowledged publishes. Everything
//! else about the wire protocol belongs to the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames exchanged with the real-time gateway, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A named application event.
    Event {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default)]
        payload: Value,
        /// Ack id when the sender requests an acknowledgement.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },
    /// Acknowledgement reply, correlated by ack id.
    Ack {
        /// The ack id being answered.
        ack: u64,
        /// The remote handler's return value.
        #[serde(default)]
        payload: Value,
    },
}
