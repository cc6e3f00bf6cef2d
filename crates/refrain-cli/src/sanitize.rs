// SPDX-License-Identifier: GPL-3.0-or-later

//! Normalization of recognition results into plain JSON.
//!
//! Raw byte payloads are decoded as UTF-8, engine scalars are unwrapped into plain
//! numbers, and maps/sequences are rebuilt recursively. Everything else passes
//! through. NaN and infinities have no JSON form and become `null`.

use std::string::FromUtf8Error;

use refrain_engine::RawResultValue;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Emitted in place of a result when nothing matched.
pub const NO_MATCH: &str = "None";

#[derive(Debug, Error)]
#[error("result contains bytes that are not valid UTF-8: {0}")]
pub struct EncodingError(#[from] FromUtf8Error);

pub fn sanitize(value: &RawResultValue) -> Result<Value, EncodingError> {
    Ok(match value {
        RawResultValue::Null => Value::Null,
        RawResultValue::Bool(b) => Value::Bool(*b),
        RawResultValue::Int(i) => Value::Number((*i).into()),
        RawResultValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        RawResultValue::Text(s) => Value::String(s.clone()),
        RawResultValue::Bytes(bytes) => Value::String(String::from_utf8(bytes.clone())?),
        RawResultValue::Scalar(scalar) => scalar.item().map_or(Value::Null, Value::Number),
        RawResultValue::Sequence(items) => Value::Array(
            items
                .iter()
                .map(sanitize)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        RawResultValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| sanitize(value).map(|clean| (key.clone(), clean)))
                .collect::<Result<Map<_, _>, _>>()?,
        ),
    })
}

/// Text printed for a recognition outcome: [`NO_MATCH`] or one line of JSON.
///
/// A missing result and a top-level null both mean nothing matched.
pub fn render(result: Option<&RawResultValue>) -> Result<String, EncodingError> {
    match result {
        None | Some(RawResultValue::Null) => Ok(NO_MATCH.to_string()),
        Some(value) => Ok(sanitize(value)?.to_string()),
    }
}
