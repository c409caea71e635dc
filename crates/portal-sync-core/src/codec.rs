//! Value codec
//!
//! Every value the sync layer stores is a JSON document. This module is the
//! single place where values become text (for the persistent cache) and text
//! becomes values again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors converting between values and their serialized form
#[derive(Error, Debug)]
pub enum CodecError {
    /// Value could not be serialized
    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored text is not valid JSON (or not the expected shape)
    #[error("Failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize a value for persistence
pub fn encode(value: &Value) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Deserialize a persisted value
pub fn decode(text: &str) -> Result<Value, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// Convert any serializable type into a value
pub fn to_value<T: Serialize>(item: &T) -> Result<Value, CodecError> {
    serde_json::to_value(item).map_err(CodecError::Encode)
}

/// Convert a value into a typed structure
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(CodecError::Decode)
}
