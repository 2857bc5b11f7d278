//! The tagged value universe the MessagePack codec serializes and parses.
//!
//! The wire format treats serializable values as an untyped union and
//! picks an encoding by runtime inspection. This models that union as an
//! explicit variant instead: dispatch on the tag, and do any conversion
//! from a host mapping type (`serde_json::Value`, a caller's own struct)
//! to `Value` at the boundary, not inside the encoder.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A value in the MessagePack codec's supported universe.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`/`undefined`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer. Width selection happens at encode time.
    Int(i64),
    /// A finite non-integer number, or any value the caller wants encoded
    /// as float64 regardless of integral-ness.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A binary blob (`bin` family — never fixbin, see codec::ser).
    Bin(Vec<u8>),
    /// An ordered sequence.
    Array(Vec<Value>),
    /// A string-keyed mapping. Order is the caller's insertion order;
    /// receivers must not depend on it.
    Map(Vec<(String, Value)>),
    /// A point in time, encoded with ext type 0xFF.
    Date(DateTime<Utc>),
    /// An extension type other than 0xFF, returned uninterpreted.
    Ext(i8, Vec<u8>),
}

impl Value {
    /// Build a `Value` from a `serde_json::Value`. `null` is a legal map
    /// value in its own right (it encodes to `0xC0` like anywhere else);
    /// only an `undefined`-style member would be elided, and JSON has no
    /// such concept, so this conversion never drops a member. Callers
    /// building `Value::Map` directly control elision themselves by simply
    /// not pushing a pair.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(a) => Value::Array(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => {
                Value::Map(o.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }

    /// Convert back to `serde_json::Value` for handing results to callers.
    /// `Date` becomes an RFC3339 string (there is no native JSON date type);
    /// `Bin`/`Ext` become base-free byte arrays of numbers since JSON has no
    /// binary type either.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bin(b) => serde_json::Value::Array(b.iter().map(|&x| serde_json::json!(x)).collect()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Map(m) => {
                let mut map = serde_json::Map::new();
                for (k, v) in m {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Ext(t, data) => {
                let mut map = BTreeMap::new();
                map.insert("type".to_string(), serde_json::json!(t));
                map.insert(
                    "data".to_string(),
                    serde_json::Value::Array(data.iter().map(|&b| serde_json::json!(b)).collect()),
                );
                serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
            }
        }
    }

    /// True if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert an arbitrary `Serialize` type to `Value`, falling back to
    /// `replacement` if the serde data model can't represent it (e.g. a map
    /// with non-string keys, or a custom `Serialize` impl that errors). The
    /// closed `Value` enum can always encode whatever `replacement`
    /// produces, so there is no second level of fallback to worry about.
    pub fn from_serialize<T: serde::Serialize>(value: &T, replacement: Value) -> Value {
        match serde_json::to_value(value) {
            Ok(j) => Value::from_json(&j),
            Err(_) => replacement,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
