//! JSON-RPC 2.0 message shapes carried inside each MessagePack frame.

use crate::codec::Value;

/// A JSON-RPC request or notification id. `String`/`Int` correlate a
/// response; `Null` marks a notification (the peer never replies to it).
#[derive(Debug, Clone, PartialEq)]
pub enum MessageId {
    /// A server- or client-generated string id (this client always uses
    /// string ids so a single counter space spans reconnects).
    Str(String),
    /// A numeric id, accepted from peers that use one.
    Int(i64),
    /// No id: a notification.
    Null,
}

impl MessageId {
    fn to_value(&self) -> Value {
        match self {
            MessageId::Str(s) => Value::Str(s.clone()),
            MessageId::Int(i) => Value::Int(*i),
            MessageId::Null => Value::Null,
        }
    }

    fn from_value(v: &Value) -> Option<MessageId> {
        match v {
            Value::Str(s) => Some(MessageId::Str(s.clone())),
            Value::Int(i) => Some(MessageId::Int(*i)),
            Value::Null => Some(MessageId::Null),
            _ => None,
        }
    }
}

/// An outbound or inbound request: expects exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: MessageId,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("id".into(), self.id.to_value()),
            ("method".into(), Value::Str(self.method.clone())),
            ("params".into(), self.params.clone()),
        ])
    }
}

/// A one-way message: no id, no response expected.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

impl Notification {
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("method".into(), Value::Str(self.method.clone())),
            ("params".into(), self.params.clone()),
        ])
    }
}

/// A JSON-RPC error object as carried in an error response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// An inbound message once its shape has been determined: either a
/// response-shaped frame (a reply to a pending request, or a push to a
/// stream subscription — both carry an `id` and are told apart by the
/// session checking its stream table before its pending table) or a
/// one-way notification with no id.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"id": ..., "result": ...}` — a request reply or a stream push.
    Success { id: MessageId, result: Value },
    /// `{"id": ..., "error": {...}}` — a request reply or a stream push.
    Error { id: MessageId, error: RpcErrorObject },
    /// `{"method": ..., "params": ...}` with no `id`: a plain one-way
    /// notification, never a stream push.
    Notification { method: String, params: Value },
}

/// Parse a decoded [`Value`] into one of the three inbound shapes this
/// client understands. Anything else (missing `jsonrpc`, a request sent
/// *to* us, a malformed member) is a parse error — the caller logs and
/// drops it rather than propagating it to request callers.
pub fn parse_inbound(value: &Value) -> Result<InboundMessage, String> {
    let Value::Map(members) = value else {
        return Err("top-level message must be a map".to_string());
    };
    let get = |key: &str| members.iter().find(|(k, _)| k == key).map(|(_, v)| v);

    if get("jsonrpc").and_then(|v| if let Value::Str(s) = v { Some(s.as_str()) } else { None }) != Some("2.0") {
        return Err("missing or invalid jsonrpc version field".to_string());
    }

    if let Some(method) = get("method") {
        let Value::Str(method) = method else {
            return Err("method field must be a string".to_string());
        };
        let params = get("params").cloned().unwrap_or(Value::Null);
        return Ok(InboundMessage::Notification {
            method: method.clone(),
            params,
        });
    }

    let id = get("id")
        .and_then(MessageId::from_value)
        .ok_or_else(|| "response is missing a valid id".to_string())?;

    if let Some(result) = get("result") {
        return Ok(InboundMessage::Success {
            id,
            result: result.clone(),
        });
    }

    if let Some(error) = get("error") {
        let Value::Map(error_members) = error else {
            return Err("error field must be a map".to_string());
        };
        let field = |key: &str| error_members.iter().find(|(k, _)| k == key).map(|(_, v)| v);
        let code = match field("code") {
            Some(Value::Int(i)) => *i,
            _ => return Err("error.code must be an integer".to_string()),
        };
        let message = match field("message") {
            Some(Value::Str(s)) => s.clone(),
            _ => return Err("error.message must be a string".to_string()),
        };
        let data = field("data").cloned();
        return Ok(InboundMessage::Error {
            id,
            error: RpcErrorObject { code, message, data },
        });
    }

    Err("response has neither result nor error".to_string())
}
