// SPDX-License-Identifier: GPL-3.0-or-later

//! Values produced by recognition.
//!
//! Recognition results are nested structures that may carry raw byte payloads
//! (names and digests as stored) and numeric scalars in the engine's own
//! representation. Neither is directly serializable as text; callers normalize
//! them before emitting.

use std::collections::BTreeMap;

use serde_json::{Number, Value};

/// Numeric scalar in the engine's native width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
}

impl Scalar {
    /// Extract the plain number. Returns `None` for NaN and infinities.
    ///
    /// `F32` goes through its shortest decimal form, so `0.87f32` yields `0.87`
    /// rather than `0.8700000047683716`.
    pub fn item(&self) -> Option<Number> {
        match *self {
            Scalar::F32(v) => v
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64),
            Scalar::F64(v) => Number::from_f64(v),
            Scalar::I32(v) => Some(Number::from(v)),
            Scalar::I64(v) => Some(Number::from(v)),
            Scalar::U32(v) => Some(Number::from(v)),
            Scalar::U64(v) => Some(Number::from(v)),
        }
    }
}

/// A recognition result node.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResultValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Scalar(Scalar),
    Sequence(Vec<RawResultValue>),
    Map(BTreeMap<String, RawResultValue>),
}

impl RawResultValue {
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawResultValue)>,
    {
        RawResultValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<bool> for RawResultValue {
    fn from(v: bool) -> Self {
        RawResultValue::Bool(v)
    }
}

impl From<i64> for RawResultValue {
    fn from(v: i64) -> Self {
        RawResultValue::Int(v)
    }
}

impl From<f64> for RawResultValue {
    fn from(v: f64) -> Self {
        RawResultValue::Float(v)
    }
}

impl From<&str> for RawResultValue {
    fn from(v: &str) -> Self {
        RawResultValue::Text(v.to_string())
    }
}

impl From<String> for RawResultValue {
    fn from(v: String) -> Self {
        RawResultValue::Text(v)
    }
}

impl From<Vec<u8>> for RawResultValue {
    fn from(v: Vec<u8>) -> Self {
        RawResultValue::Bytes(v)
    }
}

impl From<Scalar> for RawResultValue {
    fn from(v: Scalar) -> Self {
        RawResultValue::Scalar(v)
    }
}

impl From<Vec<RawResultValue>> for RawResultValue {
    fn from(v: Vec<RawResultValue>) -> Self {
        RawResultValue::Sequence(v)
    }
}

impl From<Value> for RawResultValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawResultValue::Null,
            Value::Bool(b) => RawResultValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawResultValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    RawResultValue::Scalar(Scalar::U64(u))
                } else {
                    RawResultValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => RawResultValue::Text(s),
            Value::Array(items) => {
                RawResultValue::Sequence(items.into_iter().map(RawResultValue::from).collect())
            }
            Value::Object(map) => RawResultValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RawResultValue::from(v)))
                    .collect(),
            ),
        }
    }
}
