//! Integration tests for the connection manager over a scripted transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use docfinder_core::error::AppError;
use docfinder_core::result::AppResult;
use docfinder_realtime::manager::{ConnectionManager, PublishOutcome};
use docfinder_realtime::state::{ConnectionEvent, ConnectionState};
use docfinder_realtime::transport::{
    ConnectOptions, EventCallback, ListenerId, Transport, TransportEvent, TransportHandle,
};

/// Scripted transport: hands out one mock handle per connect call.
#[derive(Debug, Default)]
struct MockTransport {
    handles: Mutex<Vec<Arc<MockHandle>>>,
    fail_connect: AtomicBool,
}

impl MockTransport {
    fn failing() -> Self {
        let transport = Self::default();
        transport.fail_connect.store(true, Ordering::SeqCst);
        transport
    }

    fn latest(&self) -> Arc<MockHandle> {
        self.handles.lock().unwrap().last().unwrap().clone()
    }

    fn connect_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        namespace: &str,
        _options: ConnectOptions,
    ) -> AppResult<Arc<dyn TransportHandle>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(AppError::transport("Connection refused"));
        }
        let handle = Arc::new(MockHandle::new(namespace));
        self.handles.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Scripted transport handle recording every binding and emission.
struct MockHandle {
    namespace: String,
    connected: AtomicBool,
    disconnect_calls: AtomicUsize,
    bound: Mutex<Vec<(String, ListenerId, EventCallback)>>,
    emitted: Mutex<Vec<(String, Value)>>,
    ack_reply: Mutex<Option<Value>>,
    lifecycle: broadcast::Sender<TransportEvent>,
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("namespace", &self.namespace)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockHandle {
    fn new(namespace: &str) -> Self {
        let (lifecycle, _) = broadcast::channel(16);
        Self {
            namespace: namespace.to_string(),
            connected: AtomicBool::new(false),
            disconnect_calls: AtomicUsize::new(0),
            bound: Mutex::new(Vec::new()),
            emitted: Mutex::new(Vec::new()),
            ack_reply: Mutex::new(None),
            lifecycle,
        }
    }

    /// Simulates the transport coming up and lets the manager react.
    async fn go_online(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.lifecycle.send(TransportEvent::Connected);
        settle().await;
    }

    /// Simulates a transport drop and lets the manager react.
    async fn go_offline(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.lifecycle.send(TransportEvent::Disconnected);
        settle().await;
    }

    /// Delivers an inbound event to the currently bound callbacks, in bind
    /// order.
    fn deliver(&self, event: &str, payload: Value) {
        let callbacks: Vec<EventCallback> = self
            .bound
            .lock()
            .unwrap()
            .iter()
            .filter(|(bound_event, _, _)| bound_event == event)
            .map(|(_, _, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(payload.clone());
        }
    }

    fn bound_ids(&self) -> Vec<(String, ListenerId)> {
        self.bound
            .lock()
            .unwrap()
            .iter()
            .map(|(event, id, _)| (event.clone(), *id))
            .collect()
    }

    fn emitted_events(&self) -> Vec<(String, Value)> {
        self.emitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()> {
        self.emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> AppResult<Value> {
        self.emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        self.ack_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::timeout("No acknowledgement"))
    }

    fn on(&self, event: &str, id: ListenerId, callback: EventCallback) {
        let mut bound = self.bound.lock().unwrap();
        bound.retain(|(bound_event, bound_id, _)| !(bound_event == event && *bound_id == id));
        bound.push((event.to_string(), id, callback));
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.bound
            .lock()
            .unwrap()
            .retain(|(bound_event, bound_id, _)| !(bound_event == event && *bound_id == id));
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn lifecycle(&self) -> broadcast::Receiver<TransportEvent> {
        self.lifecycle.subscribe()
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets the manager's lifecycle task process pending notifications.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> EventCallback) {
    let calls: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let make = {
        let calls = Arc::clone(&calls);
        move |name: &'static str| -> EventCallback {
            let calls = Arc::clone(&calls);
            Arc::new(move |_payload| calls.lock().unwrap().push(name))
        }
    };
    (calls, make)
}

#[tokio::test]
async fn test_listeners_rebound_in_registration_order_after_reconnect() {
    let transport = Arc::new(MockTransport::default());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);

    manager.open("documents", false).await;
    let handle = transport.latest();
    handle.go_online().await;

    let (calls, make) = recorder();
    let _a = manager
        .add_listener("document.reported", {
            let cb = make("a");
            move |payload| cb(payload)
        })
        .await
        .unwrap();
    let _b = manager
        .add_listener("document.matched", {
            let cb = make("b");
            move |payload| cb(payload)
        })
        .await
        .unwrap();
    let _c = manager
        .add_listener("document.reported", {
            let cb = make("c");
            move |payload| cb(payload)
        })
        .await
        .unwrap();

    let before = handle.bound_ids();
    assert_eq!(
        before,
        vec![
            ("document.reported".to_string(), 1),
            ("document.matched".to_string(), 2),
            ("document.reported".to_string(), 3),
        ]
    );

    handle.go_offline().await;
    assert!(handle.bound_ids().is_empty());

    handle.go_online().await;
    assert_eq!(handle.bound_ids(), before);

    handle.deliver("document.reported", json!({"id": 1}));
    assert_eq!(*calls.lock().unwrap(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_publish_while_disconnected_is_a_no_op() {
    let transport = Arc::new(MockTransport::default());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);
    let mut events = manager.subscribe_events();

    manager.open("documents", false).await;

    let outcome = manager.publish("document.reported", json!({"id": 1})).await;
    assert_eq!(outcome, PublishOutcome::NotConnected);

    let ack = manager
        .publish_with_ack("document.reported", json!({"id": 1}))
        .await
        .unwrap();
    assert_eq!(ack, None);

    assert!(transport.latest().emitted_events().is_empty());

    for _ in 0..2 {
        let event = events.try_recv().unwrap();
        assert!(matches!(event, ConnectionEvent::PublishSkipped { .. }));
    }
}

#[tokio::test]
async fn test_unregister_prevents_future_invocations() {
    let transport = Arc::new(MockTransport::default());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);

    manager.open("documents", false).await;
    let handle = transport.latest();
    handle.go_online().await;

    let (calls, make) = recorder();
    let guard = manager
        .add_listener("document.reported", {
            let cb = make("a");
            move |payload| cb(payload)
        })
        .await
        .unwrap();

    handle.deliver("document.reported", json!({}));
    assert_eq!(calls.lock().unwrap().len(), 1);

    guard.unregister();
    handle.deliver("document.reported", json!({}));
    assert_eq!(calls.lock().unwrap().len(), 1);

    // The handler does not come back on reconnect either.
    handle.go_offline().await;
    handle.go_online().await;
    assert!(handle.bound_ids().is_empty());
    handle.deliver("document.reported", json!({}));
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_open_with_new_pair_tears_down_previous() {
    let transport = Arc::new(MockTransport::default());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);

    manager.open("documents", false).await;
    let first = transport.latest();
    first.go_online().await;
    manager
        .add_listener("document.reported", |_| {})
        .await
        .unwrap();

    // Same pair: reused, no new transport connect.
    manager.open("documents", false).await;
    assert_eq!(transport.connect_count(), 1);

    // Differing auth mode: previous connection is closed first.
    manager.open("documents", true).await;
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(first.disconnect_calls.load(Ordering::SeqCst), 1);
    assert!(first.bound_ids().is_empty());

    // Listeners registered on the old connection are gone; the new
    // connection starts with an empty table.
    let second = transport.latest();
    second.go_online().await;
    assert!(second.bound_ids().is_empty());
}

#[tokio::test]
async fn test_publish_with_ack_resolves_with_remote_value() {
    let transport = Arc::new(MockTransport::default());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);

    manager.open("documents", false).await;
    let handle = transport.latest();
    handle.go_online().await;

    *handle.ack_reply.lock().unwrap() = Some(json!({"accepted": true}));

    let reply = manager
        .publish_with_ack("document.claim", json!({"id": 9}))
        .await
        .unwrap();
    assert_eq!(reply, Some(json!({"accepted": true})));
}

#[tokio::test]
async fn test_connect_failure_is_reported_not_thrown() {
    let transport = Arc::new(MockTransport::failing());
    let manager = ConnectionManager::new(Arc::clone(&transport) as Arc<dyn Transport>, None);
    let mut events = manager.subscribe_events();

    // No panic, no error return.
    manager.open("documents", false).await;

    assert_eq!(manager.state().await, ConnectionState::Disconnected);
    let event = events.try_recv().unwrap();
    assert!(matches!(event, ConnectionEvent::ConnectError { .. }));
}
