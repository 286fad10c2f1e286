//! Records exchanged between the engine and concepts.

use crate::error::{EngineError, Result};

pub use serde_json::Value;

/// A record of named values: concept inputs, outputs, and response payloads.
pub type Record = serde_json::Map<String, Value>;

/// Build a [`Record`] from `json!` object syntax.
///
/// ```
/// let r = buybye_core::record! { "email": "a@b.c", "n": 3 };
/// assert_eq!(r["n"], 3);
/// ```
#[macro_export]
macro_rules! record {
    ($($body:tt)*) => {
        match $crate::serde_json::json!({ $($body)* }) {
            $crate::serde_json::Value::Object(map) => map,
            _ => $crate::value::Record::new(),
        }
    };
}

/// Convert a JSON value into a record, rejecting non-objects.
pub fn as_record(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::NotARecord(kind_of(&other).to_string())),
    }
}

/// Follow a dotted path (`"user._id"`) through nested objects.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
