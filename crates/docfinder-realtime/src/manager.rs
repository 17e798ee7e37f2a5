//! Connection manager — a stable publish/subscribe interface over an
//! unreliable, reconnecting transport.
//!
//! One connection is live per (namespace, auth-mode) pair at a time;
//! opening a differing pair tears the previous connection down first.
//! Connect failures and drops surface only on the observability event
//! stream, never as errors to callers.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use docfinder_core::error::AppError;
use docfinder_core::result::AppResult;
use docfinder_core::traits::credentials::CredentialSource;

use crate::listener::registry::ListenerRegistry;
use crate::state::{ConnectionEvent, ConnectionState};
use crate::transport::{
    ConnectOptions, EventCallback, ListenerId, Transport, TransportEvent, TransportHandle,
};

/// Identity of one connection: which event stream it joins and whether the
/// handshake carries credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionKey {
    /// Server-side logical channel.
    pub namespace: String,
    /// Whether the handshake is authenticated.
    pub authenticated: bool,
}

/// Outcome of a fire-and-forget publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The event was handed to the transport.
    Sent,
    /// No connection was live; nothing was sent.
    NotConnected,
}

/// Unregister handle returned by [`ConnectionManager::add_listener`].
///
/// Removes that exact handler from both the durable table and, when bound,
/// the live transport. A guard outliving its connection unregisters as a
/// no-op.
pub struct ListenerGuard {
    connection: Weak<Connection>,
    event: String,
    id: ListenerId,
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

impl ListenerGuard {
    /// The registration id of the guarded handler.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes this exact handler. Future deliveries, including after
    /// reconnects, no longer reach it; an invocation already in progress
    /// is not cancelled.
    pub fn unregister(self) {
        if let Some(connection) = self.connection.upgrade() {
            connection.remove_listener(&self.event, self.id);
        }
    }
}

/// One connection instance with its durable listener table.
struct Connection {
    key: ConnectionKey,
    registry: ListenerRegistry,
    handle: StdMutex<Option<Arc<dyn TransportHandle>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    lifecycle_task: StdMutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Connection {
    fn new(key: ConnectionKey, events: broadcast::Sender<ConnectionEvent>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        Self {
            key,
            registry: ListenerRegistry::new(),
            handle: StdMutex::new(None),
            state_tx,
            state_rx,
            lifecycle_task: StdMutex::new(None),
            events,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let _ = self.state_tx.send(next);
    }

    /// The transport handle, only while the link is live.
    fn live_handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.handle
            .lock()
            .expect("handle lock poisoned")
            .as_ref()
            .filter(|handle| handle.is_connected())
            .cloned()
    }

    /// Attaches a transport handle and starts mirroring its lifecycle.
    fn attach(self: &Arc<Self>, handle: Arc<dyn TransportHandle>) {
        *self.handle.lock().expect("handle lock poisoned") = Some(Arc::clone(&handle));

        let mut lifecycle = handle.lifecycle();
        let connection = Arc::clone(self);
        let task_handle = Arc::clone(&handle);
        let task = tokio::spawn(async move {
            let handle = task_handle;
            loop {
                match lifecycle.recv().await {
                    Ok(TransportEvent::Connected) => connection.on_transport_connected(&handle),
                    Ok(TransportEvent::Disconnected) => {
                        connection.registry.detach_all(handle.as_ref());
                        connection.set_state(ConnectionState::Disconnected);
                        let _ = connection.events.send(ConnectionEvent::Disconnected {
                            namespace: connection.key.namespace.clone(),
                        });
                        debug!(namespace = %connection.key.namespace, "Connection dropped");
                    }
                    Ok(TransportEvent::ConnectError { reason }) => {
                        connection.set_state(ConnectionState::Disconnected);
                        let _ = connection.events.send(ConnectionEvent::ConnectError {
                            namespace: connection.key.namespace.clone(),
                            reason,
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.lifecycle_task.lock().expect("task lock poisoned") = Some(task);

        // The transport may have come up before the lifecycle subscription
        // existed; binding replaces by id, so a duplicate Connected event
        // cannot double-register.
        if handle.is_connected() {
            self.on_transport_connected(&handle);
        }
    }

    fn on_transport_connected(&self, handle: &Arc<dyn TransportHandle>) {
        self.registry.bind_all(handle.as_ref());
        self.set_state(ConnectionState::Connected);
        let _ = self.events.send(ConnectionEvent::Connected {
            namespace: self.key.namespace.clone(),
        });
        info!(
            namespace = %self.key.namespace,
            listeners = self.registry.len(),
            "Connection live, listeners bound"
        );
    }

    fn add_listener(self: &Arc<Self>, event: &str, callback: EventCallback) -> ListenerGuard {
        let id = self.registry.add(event, callback.clone());
        if let Some(handle) = self.live_handle() {
            handle.on(event, id, callback);
        }
        debug!(event, id, "Listener registered");

        ListenerGuard {
            connection: Arc::downgrade(self),
            event: event.to_string(),
            id,
        }
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        if self.registry.remove(event, id) {
            let handle = self
                .handle
                .lock()
                .expect("handle lock poisoned")
                .clone();
            if let Some(handle) = handle {
                handle.off(event, id);
            }
            debug!(event, id, "Listener unregistered");
        }
    }

    /// Terminal teardown: transport disconnected, bindings removed, table
    /// cleared.
    async fn close(&self) {
        if let Some(task) = self
            .lifecycle_task
            .lock()
            .expect("task lock poisoned")
            .take()
        {
            task.abort();
        }

        let handle = self.handle.lock().expect("handle lock poisoned").take();
        if let Some(handle) = handle {
            self.registry.detach_all(handle.as_ref());
            handle.disconnect().await;
        }

        self.registry.clear();
        self.set_state(ConnectionState::Closed);
        info!(namespace = %self.key.namespace, "Connection closed");
    }
}

/// Owns at most one live connection and hides connect/disconnect churn
/// from publish/subscribe callers.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    credentials: Option<Arc<dyn CredentialSource>>,
    events: broadcast::Sender<ConnectionEvent>,
    current: Mutex<Option<Arc<Connection>>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport)
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager over `transport`. When `credentials` is present it
    /// is supplied to authenticated handshakes.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Option<Arc<dyn CredentialSource>>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            credentials,
            events,
            current: Mutex::new(None),
        }
    }

    /// Subscribe to connection notifications (connected, disconnected,
    /// connect errors, skipped publishes).
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Opens a connection for `(namespace, use_auth)`.
    ///
    /// A live connection for the same pair is reused; a differing pair is
    /// torn down first. A transport that cannot connect is not an error
    /// here — failures arrive on the event stream while the transport
    /// retries on its own.
    pub async fn open(&self, namespace: &str, use_auth: bool) {
        let key = ConnectionKey {
            namespace: namespace.to_string(),
            authenticated: use_auth,
        };

        let mut current = self.current.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.key == key && existing.state() != ConnectionState::Closed {
                debug!(namespace, use_auth, "Connection already open for this pair");
                return;
            }
        }
        if let Some(previous) = current.take() {
            previous.close().await;
        }

        let connection = Arc::new(Connection::new(key, self.events.clone()));
        connection.set_state(ConnectionState::Connecting);

        let options = ConnectOptions {
            credentials: if use_auth {
                self.credentials.clone()
            } else {
                None
            },
        };

        match self.transport.connect(namespace, options).await {
            Ok(handle) => connection.attach(handle),
            Err(e) => {
                warn!(namespace, error = %e, "Transport connect failed");
                connection.set_state(ConnectionState::Disconnected);
                let _ = self.events.send(ConnectionEvent::ConnectError {
                    namespace: namespace.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        *current = Some(connection);
    }

    /// Emits `event` if the connection is live.
    ///
    /// Never errors and never queues: while disconnected this performs no
    /// network action, raises a [`ConnectionEvent::PublishSkipped`]
    /// warning, and reports [`PublishOutcome::NotConnected`].
    pub async fn publish(&self, event: &str, payload: Value) -> PublishOutcome {
        let Some(handle) = self.live_handle().await else {
            self.warn_not_connected(event);
            return PublishOutcome::NotConnected;
        };

        match handle.emit(event, payload).await {
            Ok(()) => PublishOutcome::Sent,
            Err(e) => {
                warn!(event, error = %e, "Publish failed");
                let _ = self.events.send(ConnectionEvent::PublishSkipped {
                    event: event.to_string(),
                });
                PublishOutcome::NotConnected
            }
        }
    }

    /// Emits `event` and awaits the correlated acknowledgement.
    ///
    /// While disconnected nothing is sent and `Ok(None)` is returned with
    /// the same non-fatal warning as [`ConnectionManager::publish`]. When
    /// connected, the transport's ack timeout surfaces as an error.
    pub async fn publish_with_ack(&self, event: &str, payload: Value) -> AppResult<Option<Value>> {
        let Some(handle) = self.live_handle().await else {
            self.warn_not_connected(event);
            return Ok(None);
        };

        handle.emit_with_ack(event, payload).await.map(Some)
    }

    /// Registers `handler` under `event` in the durable table; binds it
    /// immediately when the transport is live. The returned guard removes
    /// that exact handler.
    pub async fn add_listener(
        &self,
        event: &str,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) -> AppResult<ListenerGuard> {
        let current = self.current.lock().await;
        let connection = current
            .as_ref()
            .ok_or_else(|| AppError::transport("No open connection; call open() first"))?;
        Ok(connection.add_listener(event, Arc::new(handler)))
    }

    /// State of the current connection, or `Idle` when none was opened.
    pub async fn state(&self) -> ConnectionState {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|connection| connection.state())
            .unwrap_or(ConnectionState::Idle)
    }

    /// Tears down the current connection, if any. Terminal for that
    /// connection instance.
    pub async fn close(&self) {
        if let Some(connection) = self.current.lock().await.take() {
            connection.close().await;
        }
    }

    async fn live_handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.current
            .lock()
            .await
            .as_ref()
            .and_then(|connection| connection.live_handle())
    }

    fn warn_not_connected(&self, event: &str) {
        warn!(event, "Not connected, dropping publish");
        let _ = self.events.send(ConnectionEvent::PublishSkipped {
            event: event.to_string(),
        });
    }
}
