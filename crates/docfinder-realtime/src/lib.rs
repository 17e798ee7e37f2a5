//! # docfinder-realtime
//!
//! Real-time client engine for DocFinder. Provides:
//!
//! - A connection manager owning one live connection per
//!   (namespace, auth-mode) pair
//! - Durable listener registrations that survive transport reconnects
//! - Fire-and-forget and acknowledged publishes that never throw while
//!   disconnected
//! - A WebSocket transport with transport-native reconnection
//!
//! Connection failures are surfaced through an observability event stream,
//! never as errors to publish/subscribe callers.

pub mod frame;
pub mod listener;
pub mod manager;
pub mod state;
pub mod transport;

pub use listener::registry::ListenerRegistry;
pub use manager::{ConnectionManager, ListenerGuard, PublishOutcome};
pub use state::{ConnectionEvent, ConnectionState};
pub use transport::ws::WsTransport;
