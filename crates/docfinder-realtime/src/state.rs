//! Connection state machine and observability events.

use std::fmt;

/// State of one connection.
///
/// `Idle → Connecting → Connected ⇄ Disconnected → Closed`; `Closed` is
/// terminal for a connection instance. Reconnection between `Disconnected`
/// and `Connected` is driven entirely by the transport's own retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been opened.
    Idle,
    /// The transport handshake is in flight.
    Connecting,
    /// The link is live; listeners are bound.
    Connected,
    /// The link dropped; registrations are kept, bindings detached.
    Disconnected,
    /// Explicitly torn down. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Observability notifications raised by the connection manager.
///
/// This stream is the only place connection failures surface; they are
/// never escalated to errors on the publish/subscribe API.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A connection became live (first connect or reconnect).
    Connected {
        /// Namespace of the connection.
        namespace: String,
    },
    /// A live connection dropped.
    Disconnected {
        /// Namespace of the connection.
        namespace: String,
    },
    /// A connection attempt failed.
    ConnectError {
        /// Namespace of the connection.
        namespace: String,
        /// Failure description.
        reason: String,
    },
    /// A publish was skipped because no connection was live. This is the
    /// user-visible "not connected" warning.
    PublishSkipped {
        /// The event that was not sent.
        event: String,
    },
}
