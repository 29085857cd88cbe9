//! JSON encoding of the cache manifest and the batch report.
//!
//! Object keys are sorted recursively before writing, so identical values
//! always produce identical bytes and therefore identical fingerprints.

use std::collections::BTreeMap;

use fpp_core::errors::{ErrorInfo, FppError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> FppError {
    FppError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            Value::Object(sorted.into_iter().collect::<Map<_, _>>())
        }
        Value::Array(values) => Value::Array(values.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Compact JSON with recursively sorted keys.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, FppError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    serde_json::to_vec(&sort_keys(value)).map_err(|err| serde_error("json_write", err))
}

/// Decodes JSON written by [`to_canonical_json_bytes`] or by hand.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, FppError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}
