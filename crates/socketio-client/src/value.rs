//! The message tree carried by socket.io packets.
//!
//! A [`Value`] is a JSON-like tree with one extra variant for raw binary
//! buffers. Binary payloads are refcounted [`Bytes`], so cloning a tree never
//! copies attachment data and the same value can sit in the pre-connect queue
//! and in a user structure at the same time.
//!
//! Accessors are total: asking a variant for the wrong type yields a typed
//! zero value instead of failing, because generic user code inspects
//! [`Value::kind`] first and drills down afterwards.

use std::collections::BTreeMap;

use bytes::Bytes;

static NULL_VALUE: Value = Value::Null;
static EMPTY_MAP: BTreeMap<String, Value> = BTreeMap::new();

/// A socket.io payload tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The JSON `null` value
    #[default]
    Null,
    /// A boolean
    Bool(bool),
    /// A 64 bit signed integer
    Int(i64),
    /// A double precision float
    Double(f64),
    /// A UTF-8 string
    Str(String),
    /// A raw binary buffer, transmitted as a websocket binary frame
    Binary(Bytes),
    /// An ordered sequence of values
    Array(Vec<Value>),
    /// A string-keyed mapping
    Object(BTreeMap<String, Value>),
}

/// The discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Double,
    Str,
    Binary,
    Array,
    Object,
}

impl Value {
    /// The variant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::Str(_) => ValueKind::Str,
            Value::Binary(_) => ValueKind::Binary,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The integer value, or `0` for any other variant.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            _ => 0,
        }
    }

    /// The float value, or `0.0` for any other variant.
    pub fn as_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            _ => 0.0,
        }
    }

    /// The boolean value, or `false` for any other variant.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    /// The string value, or `""` for any other variant.
    pub fn as_str(&self) -> &str {
        match self {
            Value::Str(s) => s,
            _ => "",
        }
    }

    /// The binary payload, or an empty slice for any other variant.
    pub fn as_binary(&self) -> &[u8] {
        match self {
            Value::Binary(b) => b,
            _ => &[],
        }
    }

    /// The array items, or an empty slice for any other variant.
    pub fn as_array(&self) -> &[Value] {
        match self {
            Value::Array(items) => items,
            _ => &[],
        }
    }

    /// The object map, or an empty map for any other variant.
    pub fn as_object(&self) -> &BTreeMap<String, Value> {
        match self {
            Value::Object(map) => map,
            _ => &EMPTY_MAP,
        }
    }

    /// A member of an object value, or null.
    pub fn get(&self, key: &str) -> &Value {
        self.as_object().get(key).unwrap_or(&NULL_VALUE)
    }

    /// Build the `[event, ...args]` array payload of an event packet.
    pub fn event_payload(event: &str, args: Vec<Value>) -> Value {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Value::Str(event.to_string()));
        items.extend(args);
        Value::Array(items)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}
impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}
impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Binary(value)
    }
}
impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value.into())
    }
}
impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}
impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Object(value)
    }
}
