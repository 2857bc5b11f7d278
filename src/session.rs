//! The RPC session: correlates requests with responses, dispatches server
//! push messages to stream subscribers, and drives reconnect.
//!
//! One [`RpcSession`] owns one logical connection. `RpcSession` is cheap to
//! clone (it's a thin handle around an `Arc`) and every clone shares the
//! same pending-request table, stream table, and event bus — callers are
//! meant to hand clones to whatever tasks need to issue requests or listen
//! for events, rather than wrap the session in a `Mutex` themselves.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use crate::codec::{de, ser, Value};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus, EventPayload, ListenerId};
use crate::id;
use crate::transport::{ClientConfig, ConnectionState, Transport, TransportEvent};
use crate::types::{self, InboundMessage, MessageId, Notification, Request};

/// Builds a transport instance for a given URL, used to re-dial on
/// reconnect and on explicit [`RpcSession::reconnect_to_url`] calls.
pub type Connector = Arc<dyn Fn(&str) -> Arc<dyn Transport> + Send + Sync>;

/// A snapshot of the session's running counters, as returned by
/// [`RpcSession::get_stats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub errors: u64,
    pub reconnect_count: u32,
    /// Rolling average over the last `stats_window` completed requests.
    pub average_response_time_ms: f64,
    pub pending_requests: usize,
}

struct PendingEntry {
    reply: oneshot::Sender<Result<Value>>,
    sent_at: Instant,
}

type StreamHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// A handle to an active stream subscription, returned by
/// [`RpcSession::stream`]. Dropping it does not close the subscription —
/// call [`StreamController::close`] explicitly, the same way the session
/// itself never closes a stream on a caller's behalf.
#[derive(Clone)]
pub struct StreamController {
    id: String,
    closed: Arc<AtomicBool>,
    inner: Arc<Inner>,
}

impl StreamController {
    /// The id this subscription's handler is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether [`StreamController::close`] has already been called.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop delivering pushes to this subscription's handler. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inner.streams.remove(&self.id);
        }
    }
}

struct Inner {
    config: ClientConfig,
    events: EventBus,
    pending: DashMap<String, PendingEntry>,
    streams: DashMap<String, StreamHandler>,
    counters: Mutex<Counters>,
    response_times_ms: Mutex<Vec<f64>>,
    state: Mutex<ConnectionState>,
    transport: Mutex<Arc<dyn Transport>>,
    connector: Connector,
    url: Mutex<String>,
    closed: AtomicBool,
    reconnect_generation: AtomicU32,
}

#[derive(Default)]
struct Counters {
    requests_sent: u64,
    responses_received: u64,
    timeouts: u64,
    errors: u64,
    reconnect_count: u32,
}

/// A handle to one RPC session. Clone it freely; all clones share state.
#[derive(Clone)]
pub struct RpcSession {
    inner: Arc<Inner>,
}

impl RpcSession {
    /// Create a session for `url`, using `connector` to build the initial
    /// (and every subsequent reconnect) transport instance. Does not
    /// connect yet — call [`RpcSession::connect`] to do that.
    pub fn new(url: impl Into<String>, connector: Connector, config: ClientConfig) -> Self {
        let url = url.into();
        let transport = connector(&url);
        Self {
            inner: Arc::new(Inner {
                config,
                events: EventBus::new(),
                pending: DashMap::new(),
                streams: DashMap::new(),
                counters: Mutex::new(Counters::default()),
                response_times_ms: Mutex::new(Vec::new()),
                state: Mutex::new(ConnectionState::Closed),
                transport: Mutex::new(transport),
                connector,
                url: Mutex::new(url),
                closed: AtomicBool::new(false),
                reconnect_generation: AtomicU32::new(0),
            }),
        }
    }

    /// Connect to the configured URL and start the read loop and heartbeat.
    pub async fn connect(&self) -> Result<()> {
        *self.inner.state.lock() = ConnectionState::Connecting;
        let transport = self.inner.transport.lock().clone();
        let rx = transport.connect(&self.inner.config.protocols).await?;
        spawn_read_loop(self.inner.clone(), rx);
        spawn_heartbeat(self.inner.clone());
        Ok(())
    }

    /// Send a request and await its correlated response.
    ///
    /// `timeout` overrides the session's configured `request_timeout` for
    /// this call alone; `id` overrides the generated request id, letting a
    /// caller correlate a specific reply deterministically (e.g. in tests).
    /// Both default as described when `None`.
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Value,
        timeout: Option<Duration>,
        id: Option<MessageId>,
    ) -> Result<Value> {
        let state = *self.inner.state.lock();
        if state != ConnectionState::Open {
            return Err(Error::not_connected(state));
        }

        let id = message_id_key(id);
        let req = Request {
            id: MessageId::Str(id.clone()),
            method: method.into(),
            params,
        };
        if self.inner.config.debug {
            tracing::debug!(id = %id, method = %req.method, "sending request");
        }
        let frame = ser::encode(&req.to_value())?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(
            id.clone(),
            PendingEntry {
                reply: tx,
                sent_at: Instant::now(),
            },
        );

        let transport = self.inner.transport.lock().clone();
        if let Err(e) = transport.send(frame).await {
            self.inner.pending.remove(&id);
            return Err(e);
        }
        self.inner.counters.lock().requests_sent += 1;

        let effective_timeout = timeout.unwrap_or(self.inner.config.request_timeout);
        let timeout_ms = effective_timeout.as_millis() as u64;
        match tokio::time::timeout(effective_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Sender dropped without sending: the pending entry was
                // already removed by `fail_all_pending`, which sends before
                // dropping, so this path is unreachable in practice. Treat
                // it the same as a closed connection if it ever occurs.
                Err(Error::connection_closed(id))
            }
            Err(_) => {
                self.inner.pending.remove(&id);
                self.inner.counters.lock().timeouts += 1;
                if self.inner.config.debug {
                    tracing::debug!(id = %id, timeout_ms, "request timed out");
                }
                Err(Error::timeout(id, timeout_ms))
            }
        }
    }

    /// Send a one-way notification. No response is expected or awaited.
    pub async fn notify(&self, method: impl Into<String>, params: Value) -> Result<()> {
        let state = *self.inner.state.lock();
        if state != ConnectionState::Open {
            return Err(Error::not_connected(state));
        }
        let notif = Notification {
            method: method.into(),
            params,
        };
        if self.inner.config.debug {
            tracing::debug!(method = %notif.method, "sending notification");
        }
        let frame = ser::encode(&notif.to_value())?;
        let transport = self.inner.transport.lock().clone();
        transport.send(frame).await?;
        self.inner.counters.lock().requests_sent += 1;
        Ok(())
    }

    /// Open a server-push stream subscription. Sends a request frame
    /// carrying an id (generated unless `id` is given) and registers
    /// `handler` under that id; every subsequent inbound response-shaped
    /// frame carrying the same id invokes `handler` instead of resolving a
    /// pending request, until the returned [`StreamController`] is closed.
    pub async fn stream(
        &self,
        method: impl Into<String>,
        params: Value,
        id: Option<MessageId>,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) -> Result<StreamController> {
        let state = *self.inner.state.lock();
        if state != ConnectionState::Open {
            return Err(Error::not_connected(state));
        }

        let id = message_id_key(id);
        let req = Request {
            id: MessageId::Str(id.clone()),
            method: method.into(),
            params,
        };
        if self.inner.config.debug {
            tracing::debug!(id = %id, method = %req.method, "opening stream");
        }
        let frame = ser::encode(&req.to_value())?;

        self.inner.streams.insert(id.clone(), Arc::new(handler));
        let transport = self.inner.transport.lock().clone();
        if let Err(e) = transport.send(frame).await {
            self.inner.streams.remove(&id);
            return Err(e);
        }
        self.inner.counters.lock().requests_sent += 1;

        Ok(StreamController {
            id,
            closed: Arc::new(AtomicBool::new(false)),
            inner: self.inner.clone(),
        })
    }

    /// Register a lifecycle event listener.
    pub fn on(&self, event: Event, listener: impl Fn(&EventPayload) + Send + Sync + 'static) -> ListenerId {
        self.inner.events.on(event, listener)
    }

    /// Register a lifecycle event listener that fires at most once.
    pub fn once(&self, event: Event, listener: impl Fn(&EventPayload) + Send + Sync + 'static) -> ListenerId {
        self.inner.events.once(event, listener)
    }

    /// Remove a previously-registered lifecycle event listener.
    pub fn off(&self, event: Event, id: ListenerId) {
        self.inner.events.off(event, id);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Close the session. Disables auto-reconnect, fails every pending
    /// request, and closes the underlying transport.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        *self.inner.state.lock() = ConnectionState::Closing;
        let transport = self.inner.transport.lock().clone();
        let result = transport.close().await;
        *self.inner.state.lock() = ConnectionState::Closed;
        fail_all_pending(&self.inner);
        result
    }

    /// Tear down the current connection (if any), drop every pending
    /// request and active stream subscription, and connect fresh to a new
    /// URL. Unlike the automatic reconnect path, this never retries: a
    /// failed dial returns its error directly to the caller.
    pub async fn reconnect_to_url(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        self.inner.reconnect_generation.fetch_add(1, Ordering::SeqCst);
        {
            let old = self.inner.transport.lock().clone();
            let _ = old.close().await;
        }
        fail_all_pending(&self.inner);
        self.inner.streams.clear();
        *self.inner.url.lock() = url.clone();

        let transport = (self.inner.connector)(&url);
        *self.inner.transport.lock() = transport.clone();
        *self.inner.state.lock() = ConnectionState::Connecting;
        let rx = transport.connect(&self.inner.config.protocols).await?;
        spawn_read_loop(self.inner.clone(), rx);
        Ok(())
    }

    /// A snapshot of the session's running counters.
    pub fn get_stats(&self) -> SessionStats {
        let counters = self.inner.counters.lock();
        let times = self.inner.response_times_ms.lock();
        let average = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        SessionStats {
            requests_sent: counters.requests_sent,
            responses_received: counters.responses_received,
            timeouts: counters.timeouts,
            errors: counters.errors,
            reconnect_count: counters.reconnect_count,
            average_response_time_ms: average,
            pending_requests: self.inner.pending.len(),
        }
    }
}

/// Resolve a caller-supplied or generated id down to the `String` key both
/// the pending-request and stream-subscription tables use.
fn message_id_key(id: Option<MessageId>) -> String {
    match id {
        Some(MessageId::Str(s)) => s,
        Some(MessageId::Int(i)) => i.to_string(),
        Some(MessageId::Null) | None => id::generate(),
    }
}

fn fail_all_pending(inner: &Arc<Inner>) {
    let keys: Vec<String> = inner.pending.iter().map(|e| e.key().clone()).collect();
    for key in keys {
        if let Some((id, entry)) = inner.pending.remove(&key) {
            let _ = entry.reply.send(Err(Error::connection_closed(id)));
        }
    }
}

fn record_response_time(inner: &Arc<Inner>, elapsed: Duration) {
    let mut times = inner.response_times_ms.lock();
    times.push(elapsed.as_secs_f64() * 1000.0);
    let window = inner.config.stats_window.max(1);
    if times.len() > window {
        let overflow = times.len() - window;
        times.drain(0..overflow);
    }
}

fn handle_frame(inner: &Arc<Inner>, frame: &[u8]) {
    if inner.config.debug {
        tracing::trace!(bytes = frame.len(), "received frame");
    }
    let value = match de::decode(frame) {
        Ok((v, _)) => v,
        Err(e) => {
            tracing::warn!(error = %e, "dropping inbound frame that failed to decode");
            return;
        }
    };

    match types::parse_inbound(&value) {
        Ok(InboundMessage::Success { id, result }) => resolve_pending(inner, id, Ok(result)),
        Ok(InboundMessage::Error { id, error }) => resolve_pending(
            inner,
            id,
            Err(Error::RpcError {
                code: error.code,
                message: error.message,
                data: error.data.map(|v| v.to_json()),
            }),
        ),
        Ok(InboundMessage::Notification { .. }) => {
            inner.events.emit(Event::Message, EventPayload::Value(value));
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping inbound message with invalid shape");
        }
    }
}

fn resolve_pending(inner: &Arc<Inner>, id: MessageId, result: Result<Value>) {
    let key = match id {
        MessageId::Str(s) => s,
        MessageId::Int(i) => i.to_string(),
        MessageId::Null => return,
    };

    // Stream subscription ids and pending-request ids share one namespace
    // but never the same key, so checking streams first and returning is
    // always correct, not just an ordering preference: a stream push keeps
    // firing its handler for as long as the subscription stays open.
    if let Some(handler) = inner.streams.get(&key) {
        match result {
            Ok(value) => handler(value),
            Err(e) => tracing::warn!(id = %key, error = %e, "stream subscription received an error response"),
        }
        return;
    }

    if let Some((_, entry)) = inner.pending.remove(&key) {
        record_response_time(inner, entry.sent_at.elapsed());
        {
            let mut counters = inner.counters.lock();
            counters.responses_received += 1;
            if result.is_err() {
                counters.errors += 1;
            }
        }
        let _ = entry.reply.send(result);
    }
}

fn spawn_read_loop(inner: Arc<Inner>, mut rx: mpsc::Receiver<TransportEvent>) {
    let generation = inner.reconnect_generation.load(Ordering::SeqCst);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if inner.reconnect_generation.load(Ordering::SeqCst) != generation {
                // Superseded by a subsequent `reconnect_to_url` call; stop
                // driving this connection's events.
                return;
            }
            match event {
                TransportEvent::Open => {
                    *inner.state.lock() = ConnectionState::Open;
                    inner.events.emit(Event::Open, EventPayload::None);
                }
                TransportEvent::Message(frame) => handle_frame(&inner, &frame),
                TransportEvent::Close { code, reason } => {
                    *inner.state.lock() = ConnectionState::Closed;
                    fail_all_pending(&inner);
                    inner.events.emit(Event::Close, EventPayload::Text(format!("{code}: {reason}")));
                    if !inner.closed.load(Ordering::SeqCst) && inner.config.auto_reconnect {
                        spawn_reconnect(inner.clone());
                    }
                    return;
                }
                TransportEvent::Error(message) => {
                    inner.counters.lock().errors += 1;
                    inner.events.emit(Event::Error, EventPayload::Text(message));
                }
            }
        }
    });
}

fn spawn_reconnect(inner: Arc<Inner>) {
    tokio::spawn(async move {
        let max_attempts = inner.config.max_reconnect_attempts;
        if !inner.config.auto_reconnect || max_attempts == 0 {
            return;
        }
        for attempt in 1..=max_attempts {
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            inner.events.emit(Event::Reconnecting, EventPayload::Attempt(attempt));
            tokio::time::sleep(inner.config.reconnect_interval).await;

            let url = inner.url.lock().clone();
            let transport = (inner.connector)(&url);
            match transport.connect(&inner.config.protocols).await {
                Ok(rx) => {
                    *inner.transport.lock() = transport;
                    inner.counters.lock().reconnect_count += 1;
                    inner.events.emit(Event::Reconnected, EventPayload::Attempt(attempt));
                    spawn_read_loop(inner.clone(), rx);
                    return;
                }
                Err(_) => continue,
            }
        }
        inner.events.emit(Event::ReconnectFailed, EventPayload::Attempt(max_attempts));
    });
}

fn spawn_heartbeat(inner: Arc<Inner>) {
    let Some(interval) = inner.config.heartbeat_interval else {
        return;
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            if *inner.state.lock() != ConnectionState::Open {
                continue;
            }
            let notif = Notification {
                method: inner.config.heartbeat_method.clone(),
                params: Value::Null,
            };
            let Ok(frame) = ser::encode(&notif.to_value()) else {
                continue;
            };
            let transport = inner.transport.lock().clone();
            let _ = transport.send(frame).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockBehaviors, MockTransport};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn mock_connector(behaviors: MockBehaviors) -> (Connector, MockTransport) {
        let transport = MockTransport::new(behaviors);
        let captured = transport.clone();
        let connector: Connector = Arc::new(move |_url| Arc::new(captured.clone()) as Arc<dyn Transport>);
        (connector, transport)
    }

    fn test_config() -> ClientConfig {
        ClientConfig {
            request_timeout: StdDuration::from_millis(200),
            heartbeat_interval: None,
            heartbeat_method: "ping".to_string(),
            auto_reconnect: true,
            max_reconnect_attempts: 0,
            reconnect_interval: StdDuration::from_millis(10),
            protocols: Vec::new(),
            stats_window: 100,
            debug: false,
        }
    }

    #[tokio::test]
    async fn request_resolves_on_matching_response() {
        let (connector, transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let session2 = session.clone();
        let request_task = tokio::spawn(async move { session2.request("echo", Value::Int(7), None, None).await });

        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        let (decoded, _) = de::decode(&sent[0]).unwrap();
        let Value::Map(members) = decoded else { panic!("expected map") };
        let id = members.iter().find(|(k, _)| k == "id").unwrap().1.clone();
        let Value::Str(id) = id else { panic!("expected string id") };

        let response = Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("id".into(), Value::Str(id)),
            ("result".into(), Value::Int(49)),
        ]);
        transport.push_message(ser::encode(&response).unwrap());

        let result = request_task.await.unwrap().unwrap();
        assert_eq!(result, Value::Int(49));
    }

    #[tokio::test]
    async fn request_times_out_without_a_response() {
        let (connector, _transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let err = session.request("slow", Value::Null, None, None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
        assert_eq!(session.get_stats().timeouts, 1);
    }

    #[tokio::test]
    async fn request_honors_a_per_call_timeout_override() {
        let (connector, _transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        // The session-wide default is 200ms; a 5ms override should still
        // time out well before that default would have fired.
        let start = std::time::Instant::now();
        let err = session
            .request("slow", Value::Null, Some(StdDuration::from_millis(5)), Some(MessageId::Str("2".into())))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
        assert!(start.elapsed() < StdDuration::from_millis(200));
    }

    #[tokio::test]
    async fn request_honors_a_caller_supplied_id() {
        let (connector, transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let session2 = session.clone();
        let request_task =
            tokio::spawn(async move { session2.request("echo", Value::Int(1), None, Some(MessageId::Str("1".into()))).await });
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let sent = transport.sent_frames();
        let (decoded, _) = de::decode(&sent[0]).unwrap();
        let Value::Map(members) = decoded else { panic!("expected map") };
        let id = members.iter().find(|(k, _)| k == "id").unwrap().1.clone();
        assert_eq!(id, Value::Str("1".into()));

        let response = Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("id".into(), Value::Str("1".into())),
            ("result".into(), Value::Int(1)),
        ]);
        transport.push_message(ser::encode(&response).unwrap());
        assert_eq!(request_task.await.unwrap().unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn request_surfaces_rpc_error_object() {
        let (connector, transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let session2 = session.clone();
        let request_task = tokio::spawn(async move { session2.request("boom", Value::Null, None, None).await });
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let sent = transport.sent_frames();
        let (decoded, _) = de::decode(&sent[0]).unwrap();
        let Value::Map(members) = decoded else { panic!("expected map") };
        let Value::Str(id) = members.iter().find(|(k, _)| k == "id").unwrap().1.clone() else {
            panic!("expected string id")
        };

        let response = Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("id".into(), Value::Str(id)),
            (
                "error".into(),
                Value::Map(vec![
                    ("code".into(), Value::Int(-32000)),
                    ("message".into(), Value::Str("boom".into())),
                ]),
            ),
        ]);
        transport.push_message(ser::encode(&response).unwrap());

        let err = request_task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RpcError);
    }

    #[tokio::test]
    async fn stream_delivers_repeated_pushes_keyed_by_id() {
        let (connector, transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let controller = session
            .stream("ticks", Value::Null, None, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        let (decoded, _) = de::decode(&sent[0]).unwrap();
        let Value::Map(members) = decoded else { panic!("expected map") };
        let Value::Str(id) = members.iter().find(|(k, _)| k == "id").unwrap().1.clone() else {
            panic!("expected string id")
        };
        assert_eq!(id, controller.id());

        let push = |n: i64| {
            Value::Map(vec![
                ("jsonrpc".into(), Value::Str("2.0".into())),
                ("id".into(), Value::Str(id.clone())),
                ("result".into(), Value::Int(n)),
            ])
        };
        transport.push_message(ser::encode(&push(1)).unwrap());
        transport.push_message(ser::encode(&push(2)).unwrap());
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!controller.closed());

        controller.close();
        assert!(controller.closed());
        transport.push_message(ser::encode(&push(3)).unwrap());
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stream_fails_when_not_connected() {
        let (connector, _transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        let err = session.stream("ticks", Value::Null, None, |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn close_fails_pending_requests() {
        let (connector, _transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        session.connect().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        let session2 = session.clone();
        let request_task = tokio::spawn(async move { session2.request("never-replied", Value::Null, None, None).await });
        tokio::time::sleep(StdDuration::from_millis(10)).await;

        session.close().await.unwrap();
        let err = request_task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConnectionClosed);
    }

    #[tokio::test]
    async fn request_before_connect_is_not_connected() {
        let (connector, _transport) = mock_connector(MockBehaviors::default());
        let session = RpcSession::new("mock://test", connector, test_config());
        let err = session.request("x", Value::Null, None, None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotConnected);
    }
}
