//! Error handling for the RPC client.
//!
//! Mirrors the shape of a typical `thiserror`-based framework error: one
//! enum with a `kind()` classifier callers can match on, plus `From` impls
//! for the handful of upstream error types the codec and session actually
//! produce.

use std::fmt;
use thiserror::Error;

/// Error kinds surfaced to callers, per the client's public contract.
///
/// `DeserializationError` is never returned from a public API — inbound
/// frames that fail to decode are logged and dropped (see [`Error`]'s
/// module docs) — but it is still a first-class kind so internal plumbing
/// can classify it the same way as everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A send was attempted while the session was not `Open`.
    NotConnected,
    /// No response arrived before the per-request deadline.
    Timeout,
    /// The peer returned a JSON-RPC `error` object.
    RpcError,
    /// The transport closed while the request was still pending.
    ConnectionClosed,
    /// Outbound MessagePack encoding failed.
    SerializationError,
    /// Inbound MessagePack decoding failed (contained, never surfaced).
    DeserializationError,
}

/// The main error type for the RPC client.
#[derive(Error, Debug)]
pub enum Error {
    /// Attempted `request`/`notify`/`stream` while the session was not `Open`.
    #[error("not connected: session state is {state}")]
    NotConnected {
        /// The session's connection state at the time of the call.
        state: String,
    },

    /// A pending request's timer fired before a response arrived.
    #[error("request '{id}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The id of the request that timed out.
        id: String,
        /// The timeout that was in effect, in milliseconds.
        timeout_ms: u64,
    },

    /// The peer answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    RpcError {
        /// The server-provided JSON-RPC error code.
        code: i64,
        /// The server-provided error message.
        message: String,
        /// Optional server-provided error data.
        data: Option<serde_json::Value>,
    },

    /// The transport closed while this request was still pending.
    #[error("connection closed while request '{id}' was pending")]
    ConnectionClosed {
        /// The id of the request that was purged.
        id: String,
    },

    /// Outbound MessagePack encoding failed.
    #[error("failed to encode outbound message: {message}")]
    SerializationError {
        /// Human-readable description of the encoding failure.
        message: String,
    },

    /// Inbound MessagePack decoding failed. Never returned to a public
    /// caller — constructed only so the drop-and-log path has a typed
    /// value to log.
    #[error("failed to decode inbound frame: {message}")]
    DeserializationError {
        /// Human-readable description of the decoding failure.
        message: String,
    },
}

impl Error {
    /// Classify this error into one of the public [`ErrorKind`]s.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConnected { .. } => ErrorKind::NotConnected,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::RpcError { .. } => ErrorKind::RpcError,
            Error::ConnectionClosed { .. } => ErrorKind::ConnectionClosed,
            Error::SerializationError { .. } => ErrorKind::SerializationError,
            Error::DeserializationError { .. } => ErrorKind::DeserializationError,
        }
    }

    pub(crate) fn not_connected(state: impl fmt::Display) -> Self {
        Error::NotConnected {
            state: state.to_string(),
        }
    }

    pub(crate) fn timeout(id: impl Into<String>, timeout_ms: u64) -> Self {
        Error::Timeout {
            id: id.into(),
            timeout_ms,
        }
    }

    pub(crate) fn connection_closed(id: impl Into<String>) -> Self {
        Error::ConnectionClosed { id: id.into() }
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        Error::SerializationError {
            message: message.into(),
        }
    }

    pub(crate) fn deserialization(message: impl Into<String>) -> Self {
        Error::DeserializationError {
            message: message.into(),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
