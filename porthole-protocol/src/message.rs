//! Control messages exchanged with the relay
//!
//! Both directions use serde's externally tagged layout: unit variants are
//! bare strings (`"Heartbeat"`), every other variant is a single-key object
//! keyed by the variant name (`{"Hello": 9000}`).

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message sent by the relay to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Public port the relay assigned to this client.
    Hello(u16),
    /// Authentication challenge, answered with [`ClientMessage::Authenticate`].
    Challenge(Uuid),
    /// Liveness signal on the control connection.
    Heartbeat,
    /// A new inbound connection is waiting to be accepted.
    Connection(Uuid),
    /// The relay refused a request.
    Error(String),
}

/// Message sent by the client to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request a public port; `0` lets the relay choose.
    Hello(u16),
    /// Lower-case hex HMAC answering a challenge.
    Authenticate(String),
    /// Claim a pending connection on a fresh socket.
    Accept(Uuid),
}

impl ServerMessage {
    /// Decode one frame payload.
    ///
    /// Stricter than serde's derived `Deserialize`: unknown tags, multi-key
    /// objects and stray bare strings are reported with distinct errors.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        match serde_json::from_slice::<Value>(frame)? {
            Value::String(unit) if unit == "Heartbeat" => Ok(ServerMessage::Heartbeat),
            Value::String(unit) => Err(ProtocolError::UnexpectedUnitMessage(unit)),
            Value::Object(object) => {
                if object.len() != 1 {
                    return Err(ProtocolError::MalformedMessage(format!(
                        "expected a single-key object, got {} keys",
                        object.len()
                    )));
                }
                let Some((tag, payload)) = object.into_iter().next() else {
                    return Err(ProtocolError::MalformedMessage("empty object".into()));
                };
                decode_tagged(&tag, payload)
            }
            other => Err(ProtocolError::MalformedMessage(format!(
                "expected a string or object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Tag name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello(_) => "Hello",
            ServerMessage::Challenge(_) => "Challenge",
            ServerMessage::Heartbeat => "Heartbeat",
            ServerMessage::Connection(_) => "Connection",
            ServerMessage::Error(_) => "Error",
        }
    }
}

fn decode_tagged(tag: &str, payload: Value) -> Result<ServerMessage, ProtocolError> {
    match tag {
        "Hello" => {
            let port = payload
                .as_u64()
                .and_then(|port| u16::try_from(port).ok())
                .ok_or_else(|| {
                    ProtocolError::MalformedMessage(format!("invalid Hello port: {payload}"))
                })?;
            Ok(ServerMessage::Hello(port))
        }
        "Challenge" => decode_uuid("Challenge", &payload).map(ServerMessage::Challenge),
        "Connection" => decode_uuid("Connection", &payload).map(ServerMessage::Connection),
        "Error" => match payload {
            Value::String(text) => Ok(ServerMessage::Error(text)),
            other => Err(ProtocolError::MalformedMessage(format!(
                "Error payload must be a string, got {}",
                json_type(&other)
            ))),
        },
        unknown => Err(ProtocolError::MalformedMessage(format!(
            "unknown message tag: {unknown}"
        ))),
    }
}

fn decode_uuid(tag: &'static str, payload: &Value) -> Result<Uuid, ProtocolError> {
    let raw = payload.as_str().ok_or_else(|| {
        ProtocolError::MalformedMessage(format!("{tag} payload must be a string"))
    })?;
    Uuid::parse_str(raw).map_err(|source| ProtocolError::InvalidUuid { tag, source })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
