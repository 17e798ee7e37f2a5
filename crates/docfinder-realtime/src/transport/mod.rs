//! Transport collaborator abstraction.
//!
//! The connection manager never talks to a socket directly; it drives a
//! [`TransportHandle`] obtained from a [`Transport`]. Reconnection,
//! backoff, and retry limits live behind this seam — the manager adds no
//! retry layer of its own.

pub mod ws;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use docfinder_core::result::AppResult;
use docfinder_core::traits::credentials::CredentialSource;

/// Identifier of one bound listener callback.
pub type ListenerId = u64;

/// Callback invoked with the payload of a received event.
pub type EventCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Options for establishing a transport connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Supplier of the access token for authenticated handshakes. The
    /// token is fetched asynchronously while the handshake is being
    /// prepared, so it reflects the session at connect time.
    pub credentials: Option<Arc<dyn CredentialSource>>,
}

/// Lifecycle notifications emitted by a transport handle.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Handshake completed; the link is live.
    Connected,
    /// The link dropped; the transport retries on its own.
    Disconnected,
    /// A connection attempt failed.
    ConnectError {
        /// Failure description.
        reason: String,
    },
}

/// Factory for transport connections.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Establish a connection to `namespace`.
    ///
    /// Implementations connect asynchronously: the returned handle may not
    /// be live yet, and reports progress through its lifecycle stream.
    async fn connect(
        &self,
        namespace: &str,
        options: ConnectOptions,
    ) -> AppResult<Arc<dyn TransportHandle>>;
}

/// Handle to one transport connection.
#[async_trait]
pub trait TransportHandle: Send + Sync + std::fmt::Debug + 'static {
    /// Emit a fire-and-forget event.
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()>;

    /// Emit an event and await the correlated acknowledgement. Times out
    /// per the transport's configuration.
    async fn emit_with_ack(&self, event: &str, payload: Value) -> AppResult<Value>;

    /// Bind a callback for `event`. Binding an id that is already bound
    /// replaces the previous callback for that id.
    fn on(&self, event: &str, id: ListenerId, callback: EventCallback);

    /// Remove the binding for `event` with the given id.
    fn off(&self, event: &str, id: ListenerId);

    /// Whether the link is currently live.
    fn is_connected(&self) -> bool;

    /// Subscribe to lifecycle notifications.
    fn lifecycle(&self) -> broadcast::Receiver<TransportEvent>;

    /// Tear the connection down. No further reconnect attempts are made.
    async fn disconnect(&self);
}
