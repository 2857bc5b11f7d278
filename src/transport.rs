//! The transport contract a session drives, plus an in-memory mock used by
//! the session's own test suite.
//!
//! A transport is not handed a callback; it hands back an `mpsc` receiver of
//! [`TransportEvent`]s on connect. That's the idiomatic-Rust shape for the
//! same lifecycle a callback-based transport would deliver, and it composes
//! cleanly with `tokio::select!` in the session's read loop.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::Result;

/// Connection lifecycle state, mirrored from the transport into the
/// session so callers can inspect it without reaching into the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle events a transport reports through the channel returned by
/// [`Transport::connect`].
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Open,
    Message(Vec<u8>),
    Close { code: u16, reason: String },
    Error(String),
}

/// The contract a concrete transport (TCP, WebSocket, or this crate's own
/// mock) must satisfy. Frames are opaque `Vec<u8>` — the session owns
/// encoding/decoding; the transport only moves bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin connecting, returning a channel of lifecycle events. The first
    /// event on a successful connect is always `TransportEvent::Open`.
    /// `protocols` carries `ClientConfig::protocols` through unexamined —
    /// a concrete transport (e.g. WebSocket) negotiates it at the wire
    /// level; this crate's own mock ignores it.
    async fn connect(&self, protocols: &[String]) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Send one frame. Only valid once `Open` has been observed.
    async fn send(&self, frame: Vec<u8>) -> Result<()>;

    /// Current lifecycle state as the transport itself understands it.
    fn state(&self) -> ConnectionState;

    /// Close the connection, if open.
    async fn close(&self) -> Result<()>;
}

/// Client-configurable knobs, independent of any one transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a `request` waits for a reply before failing with
    /// [`crate::error::Error::Timeout`].
    pub request_timeout: Duration,
    /// Interval between heartbeat notifications. `None` disables the
    /// heartbeat entirely.
    pub heartbeat_interval: Option<Duration>,
    /// Method name used for the outbound heartbeat notification.
    pub heartbeat_method: String,
    /// Whether an unexpected close schedules an automatic reconnect at all.
    /// Independent of `max_reconnect_attempts`: a caller can leave a nonzero
    /// attempt budget in place for [`crate::session::RpcSession::reconnect_to_url`]
    /// while still opting this session out of the automatic path.
    pub auto_reconnect: bool,
    /// Maximum automatic reconnect attempts after an unexpected close.
    pub max_reconnect_attempts: u32,
    /// Fixed delay applied before every automatic reconnect attempt.
    pub reconnect_interval: Duration,
    /// Sub-protocol hint passed to the transport on connect (e.g. a
    /// WebSocket `Sec-WebSocket-Protocol` negotiation list). Opaque to the
    /// session itself — it's forwarded to the transport, never inspected.
    pub protocols: Vec<String>,
    /// Number of response-time samples kept for the rolling average in
    /// [`crate::session::SessionStats`].
    pub stats_window: usize,
    /// When set, `tracing::debug!`/`tracing::trace!` calls in the session's
    /// read/write paths are emitted; when unset they're skipped at the
    /// call site rather than relying solely on the subscriber's filter.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            heartbeat_interval: Some(Duration::from_secs(30)),
            heartbeat_method: "ping".to_string(),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_interval: Duration::from_millis(3000),
            protocols: Vec::new(),
            stats_window: 100,
            debug: false,
        }
    }
}

/// An in-memory transport used by this crate's own tests and available to
/// downstream consumers under the `mock` feature for their own tests.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Behaviors a test can arrange before connecting.
    #[derive(Default, Clone)]
    pub struct MockBehaviors {
        pub fail_connect: bool,
        pub fail_send: bool,
    }

    struct Inner {
        state: Mutex<ConnectionState>,
        sent: Mutex<Vec<Vec<u8>>>,
        outbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
        behaviors: MockBehaviors,
        connected_once: AtomicBool,
    }

    /// A transport double that never touches the network. Tests push
    /// inbound frames with [`MockTransport::push_message`] and inspect what
    /// was sent with [`MockTransport::sent_frames`].
    #[derive(Clone)]
    pub struct MockTransport {
        inner: Arc<Inner>,
    }

    impl MockTransport {
        pub fn new(behaviors: MockBehaviors) -> Self {
            Self {
                inner: Arc::new(Inner {
                    state: Mutex::new(ConnectionState::Closed),
                    sent: Mutex::new(Vec::new()),
                    outbound: Mutex::new(None),
                    behaviors,
                    connected_once: AtomicBool::new(false),
                }),
            }
        }

        /// Push an inbound frame to whatever is listening on the channel
        /// returned by the last `connect`.
        pub fn push_message(&self, frame: Vec<u8>) {
            if let Some(tx) = self.inner.outbound.lock().clone() {
                let _ = tx.try_send(TransportEvent::Message(frame));
            }
        }

        /// Simulate the peer closing the connection.
        pub fn push_close(&self, code: u16, reason: impl Into<String>) {
            *self.inner.state.lock() = ConnectionState::Closed;
            if let Some(tx) = self.inner.outbound.lock().clone() {
                let _ = tx.try_send(TransportEvent::Close {
                    code,
                    reason: reason.into(),
                });
            }
        }

        /// Every frame handed to `send` so far, in order.
        pub fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.inner.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self, _protocols: &[String]) -> Result<mpsc::Receiver<TransportEvent>> {
            if self.inner.behaviors.fail_connect {
                return Err(crate::error::Error::not_connected("mock configured to fail connect"));
            }
            let (tx, rx) = mpsc::channel(32);
            *self.inner.state.lock() = ConnectionState::Open;
            self.inner.connected_once.store(true, Ordering::SeqCst);
            *self.inner.outbound.lock() = Some(tx.clone());
            let _ = tx.try_send(TransportEvent::Open);
            Ok(rx)
        }

        async fn send(&self, frame: Vec<u8>) -> Result<()> {
            if self.inner.behaviors.fail_send {
                return Err(crate::error::Error::serialization("mock configured to fail send"));
            }
            self.inner.sent.lock().push(frame);
            Ok(())
        }

        fn state(&self) -> ConnectionState {
            *self.inner.state.lock()
        }

        async fn close(&self) -> Result<()> {
            *self.inner.state.lock() = ConnectionState::Closed;
            Ok(())
        }
    }
}
