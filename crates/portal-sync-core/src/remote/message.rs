//! Remote protocol message types
//!
//! Request/response messages exchanged with the remote store over
//! WebSocket, encoded as CBOR. Keys are fully qualified with their
//! partition (`shared:classes`, `private:u1:results`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RemoteError;

/// Messages sent to the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Fetch a value
    #[serde(rename = "get")]
    Get {
        #[serde(rename = "requestId")]
        request_id: String,
        key: String,
    },

    /// Store a value
    #[serde(rename = "set")]
    Set {
        #[serde(rename = "requestId")]
        request_id: String,
        key: String,
        value: Value,
    },
}

/// Messages received from the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Reply to `get`; `value` is absent when the key does not exist
    #[serde(rename = "value")]
    Value {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default)]
        value: Option<Value>,
    },

    /// Reply to `set`
    #[serde(rename = "ack")]
    Ack {
        #[serde(rename = "requestId")]
        request_id: String,
    },

    /// Request failed remotely
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        message: String,
    },
}

impl ClientMessage {
    /// Create a get request with a fresh request ID
    pub fn get(key: String) -> Self {
        ClientMessage::Get {
            request_id: new_request_id(),
            key,
        }
    }

    /// Create a set request with a fresh request ID
    pub fn set(key: String, value: Value) -> Self {
        ClientMessage::Set {
            request_id: new_request_id(),
            key,
            value,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            ClientMessage::Get { request_id, .. } | ClientMessage::Set { request_id, .. } => {
                request_id
            }
        }
    }

    /// Encode message to CBOR bytes
    pub fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        encode(self)
    }

    /// Decode message from CBOR bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, RemoteError> {
        decode(bytes)
    }
}

impl ServerMessage {
    pub fn request_id(&self) -> &str {
        match self {
            ServerMessage::Value { request_id, .. }
            | ServerMessage::Ack { request_id }
            | ServerMessage::Error { request_id, .. } => request_id,
        }
    }

    /// Encode message to CBOR bytes
    pub fn encode(&self) -> Result<Vec<u8>, RemoteError> {
        encode(self)
    }

    /// Decode message from CBOR bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, RemoteError> {
        decode(bytes)
    }
}

fn new_request_id() -> String {
    format!("req-{}", &uuid::Uuid::new_v4().to_string()[..8])
}

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, RemoteError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(msg, &mut bytes)
        .map_err(|e| RemoteError::Protocol(format!("CBOR encoding failed: {}", e)))?;
    Ok(bytes)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, RemoteError> {
    ciborium::from_reader(bytes)
        .map_err(|e| RemoteError::Protocol(format!("CBOR decoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique() {
        let a = ClientMessage::get("shared:classes".to_string());
        let b = ClientMessage::get("shared:classes".to_string());
        assert_ne!(a.request_id(), b.request_id());
        assert!(a.request_id().starts_with("req-"));
    }

    #[test]
    fn test_set_message_carries_nested_value() {
        let msg = ClientMessage::set(
            "private:u1:results".to_string(),
            json!([{"exam": "midterm", "score": 87.5, "flags": [true, null]}]),
        );
        let decoded = ClientMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_value_reply_without_value_is_absent() {
        let msg = ServerMessage::Value {
            request_id: "req-1".to_string(),
            value: None,
        };
        let decoded = ServerMessage::decode(&msg.encode().unwrap()).unwrap();
        match decoded {
            ServerMessage::Value { request_id, value } => {
                assert_eq!(request_id, "req-1");
                assert!(value.is_none());
            }
            _ => panic!("Expected Value message"),
        }
    }

    #[test]
    fn test_decode_garbage_is_protocol_error() {
        let err = ServerMessage::decode(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
    }
}
