//! WebSocket transport over tokio-tungstenite.
//!
//! Reconnection is transport-native: the driver task reconnects with
//! bounded exponential backoff until [`TransportHandle::disconnect`] is
//! called. Consumers above this layer never retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use docfinder_core::config::realtime::RealtimeConfig;
use docfinder_core::error::{AppError, ErrorKind};
use docfinder_core::result::AppResult;

use crate::frame::Frame;
use crate::transport::{
    ConnectOptions, EventCallback, ListenerId, Transport, TransportEvent, TransportHandle,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport factory.
#[derive(Debug, Clone)]
pub struct WsTransport {
    /// Transport configuration.
    config: RealtimeConfig,
}

impl WsTransport {
    /// Creates a new WebSocket transport.
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        namespace: &str,
        options: ConnectOptions,
    ) -> AppResult<Arc<dyn TransportHandle>> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            namespace.trim_start_matches('/')
        );

        let handle = Arc::new(WsHandle::new(url, self.config.clone(), options));
        WsHandle::spawn_driver(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Handle to one WebSocket connection.
pub struct WsHandle {
    /// Full gateway URL including the namespace.
    url: String,
    /// Transport configuration.
    config: RealtimeConfig,
    /// Connect options (credential source).
    options: ConnectOptions,
    /// Bound event callbacks, per event, in bind order.
    listeners: DashMap<String, Vec<(ListenerId, EventCallback)>>,
    /// Outstanding acknowledged publishes by ack id.
    pending_acks: DashMap<u64, oneshot::Sender<Value>>,
    /// Ack id sequence.
    next_ack: AtomicU64,
    /// Outbound message queue, drained by the driver.
    outbound_tx: mpsc::Sender<Message>,
    /// Receiver side, taken once by the driver.
    outbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    /// Whether the link is live.
    connected: AtomicBool,
    /// Lifecycle notifications.
    lifecycle: broadcast::Sender<TransportEvent>,
    /// Set on explicit disconnect; stops the driver.
    shutdown_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for WsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsHandle")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .field("pending_acks", &self.pending_acks.len())
            .finish()
    }
}

impl WsHandle {
    fn new(url: String, config: RealtimeConfig, options: ConnectOptions) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer_size.max(1));
        let (lifecycle, _) = broadcast::channel(32);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            url,
            config,
            options,
            listeners: DashMap::new(),
            pending_acks: DashMap::new(),
            next_ack: AtomicU64::new(0),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            connected: AtomicBool::new(false),
            lifecycle,
            shutdown_tx,
        }
    }

    /// Spawns the driver task owning the connect/reconnect loop.
    fn spawn_driver(handle: Arc<Self>) {
        tokio::spawn(async move {
            handle.drive().await;
        });
    }

    async fn drive(&self) {
        let Some(mut outbound) = self.outbound_rx.lock().await.take() else {
            return;
        };
        let mut shutdown = self.shutdown_tx.subscribe();

        let initial_delay = Duration::from_millis(self.config.reconnect_initial_delay_ms.max(1));
        let max_delay = Duration::from_millis(
            self.config
                .reconnect_max_delay_ms
                .max(self.config.reconnect_initial_delay_ms.max(1)),
        );
        let mut delay = initial_delay;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let attempt = tokio::select! {
                result = self.establish() => result,
                _ = shutdown.changed() => break,
            };

            let stream = match attempt {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "WebSocket connect failed");
                    let _ = self.lifecycle.send(TransportEvent::ConnectError {
                        reason: e.to_string(),
                    });
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {},
                        _ = shutdown.changed() => break,
                    }
                    delay = (delay * 2).min(max_delay);
                    continue;
                }
            };

            delay = initial_delay;
            self.connected.store(true, Ordering::SeqCst);
            let _ = self.lifecycle.send(TransportEvent::Connected);
            debug!(url = %self.url, "WebSocket connected");

            self.pump(stream, &mut outbound, &mut shutdown).await;

            self.connected.store(false, Ordering::SeqCst);
            self.fail_pending_acks();
            // Messages are never queued across a drop: anything still in
            // the outbound channel missed its connection.
            while outbound.try_recv().is_ok() {}
            let _ = self.lifecycle.send(TransportEvent::Disconnected);

            if *shutdown.borrow() {
                break;
            }

            debug!(url = %self.url, "WebSocket disconnected, transport will retry");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown.changed() => break,
            }
            delay = (delay * 2).min(max_delay);
        }
    }

    /// Performs one handshake attempt, supplying the current access token
    /// when a credential source is configured.
    async fn establish(&self) -> AppResult<WsStream> {
        let mut request = self.url.as_str().into_client_request().map_err(|e| {
            AppError::with_source(
                ErrorKind::Transport,
                format!("Invalid WebSocket URL '{}'", self.url),
                e,
            )
        })?;

        if let Some(source) = &self.options.credentials {
            if let Some(token) = source.access_token().await {
                let value = format!("Bearer {token}").parse().map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Transport,
                        "Access token is not a valid header value",
                        e,
                    )
                })?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        let handshake = timeout(
            Duration::from_secs(self.config.handshake_timeout_seconds),
            connect_async(request),
        )
        .await
        .map_err(|_| AppError::timeout("WebSocket handshake timed out"))?;

        let (stream, _response) = handshake.map_err(|e| {
            AppError::with_source(
                ErrorKind::Transport,
                format!("WebSocket handshake failed: {e}"),
                e,
            )
        })?;

        Ok(stream)
    }

    /// Moves messages in both directions until the link drops or shutdown
    /// is requested.
    async fn pump(
        &self,
        stream: WsStream,
        outbound: &mut mpsc::Receiver<Message>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                message = outbound.recv() => {
                    let Some(message) = message else { break };
                    if let Err(e) = sink.send(message).await {
                        warn!(error = %e, "WebSocket send failed");
                        break;
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.dispatch_text(text.as_str()),
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket read failed");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    /// Parses an inbound text frame and routes it.
    fn dispatch_text(&self, text: &str) {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping unparseable frame");
                return;
            }
        };

        match frame {
            Frame::Event { event, payload, .. } => {
                // Snapshot the callbacks so handlers run outside the map lock.
                let callbacks: Vec<EventCallback> = self
                    .listeners
                    .get(&event)
                    .map(|bound| bound.iter().map(|(_, cb)| cb.clone()).collect())
                    .unwrap_or_default();

                for callback in callbacks {
                    callback(payload.clone());
                }
            }
            Frame::Ack { ack, payload } => {
                if let Some((_, reply)) = self.pending_acks.remove(&ack) {
                    let _ = reply.send(payload);
                } else {
                    debug!(ack, "Ack for unknown or timed-out publish");
                }
            }
        }
    }

    /// Drops all outstanding ack waiters, failing their receivers.
    fn fail_pending_acks(&self) {
        self.pending_acks.clear();
    }
}

#[async_trait]
impl TransportHandle for WsHandle {
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()> {
        if !self.is_connected() {
            return Err(AppError::transport("Not connected"));
        }

        let frame = Frame::Event {
            event: event.to_string(),
            payload,
            ack: None,
        };
        let text = serde_json::to_string(&frame)?;

        self.outbound_tx
            .send(Message::text(text))
            .await
            .map_err(|_| AppError::transport("Connection closed while sending"))
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> AppResult<Value> {
        if !self.is_connected() {
            return Err(AppError::transport("Not connected"));
        }

        let ack = self.next_ack.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_acks.insert(ack, reply_tx);

        let frame = Frame::Event {
            event: event.to_string(),
            payload,
            ack: Some(ack),
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                self.pending_acks.remove(&ack);
                return Err(e.into());
            }
        };

        if self.outbound_tx.send(Message::text(text)).await.is_err() {
            self.pending_acks.remove(&ack);
            return Err(AppError::transport("Connection closed while sending"));
        }

        match timeout(
            Duration::from_secs(self.config.ack_timeout_seconds),
            reply_rx,
        )
        .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(AppError::transport(
                "Connection lost before acknowledgement",
            )),
            Err(_) => {
                self.pending_acks.remove(&ack);
                Err(AppError::timeout(format!(
                    "No acknowledgement for '{event}' within {}s",
                    self.config.ack_timeout_seconds
                )))
            }
        }
    }

    fn on(&self, event: &str, id: ListenerId, callback: EventCallback) {
        let mut bound = self.listeners.entry(event.to_string()).or_default();
        bound.retain(|(existing, _)| *existing != id);
        bound.push((id, callback));
    }

    fn off(&self, event: &str, id: ListenerId) {
        if let Some(mut bound) = self.listeners.get_mut(event) {
            bound.retain(|(existing, _)| *existing != id);
            if bound.is_empty() {
                drop(bound);
                self.listeners.remove(event);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn lifecycle(&self) -> broadcast::Receiver<TransportEvent> {
        self.lifecycle.subscribe()
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
    }
}
