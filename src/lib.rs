//! A JSON-RPC 2.0 client over a persistent binary frame transport.
//!
//! Requests and notifications are JSON-RPC 2.0 envelopes encoded with this
//! crate's own MessagePack codec ([`codec`]) and carried as opaque frames
//! over whatever [`transport::Transport`] the caller supplies. [`session`]
//! owns the request/response correlation table, server-push stream
//! subscriptions, connection lifecycle, heartbeat, and auto-reconnect.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsrpc::codec::Value;
//! use wsrpc::session::{Connector, RpcSession};
//! use wsrpc::transport::{ClientConfig, Transport};
//!
//! # fn build_transport(_url: &str) -> Arc<dyn Transport> { unimplemented!() }
//! # async fn run() -> wsrpc::error::Result<()> {
//! let connector: Connector = Arc::new(build_transport);
//! let session = RpcSession::new("wss://example.test/rpc", connector, ClientConfig::default());
//! session.connect().await?;
//! let result = session.request("add", Value::Array(vec![Value::Int(1), Value::Int(2)]), None, None).await?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod id;
pub mod session;
pub mod transport;
pub mod types;

/// Re-exports of the types most callers need, so `use wsrpc::prelude::*;`
/// is usually enough.
pub mod prelude {
    pub use crate::codec::Value;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::events::{Event, EventPayload, ListenerId};
    pub use crate::session::{Connector, RpcSession, SessionStats, StreamController};
    pub use crate::transport::{ClientConfig, ConnectionState, Transport, TransportEvent};
}
