//! Envelope codec.
//!
//! An envelope is a JSON array whose first element is the message-type code.
//! This module only maps between text and ordered fields; it assigns no
//! meaning to anything past the type code.

use crate::error::ProtocolError;
use crate::types::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One complete wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Vec<Value>);

impl Envelope {
    /// Wrap already-ordered fields.
    pub fn new(fields: Vec<Value>) -> Self {
        Self(fields)
    }

    /// Start an envelope with the given type code as its first field.
    pub fn of(message_type: MessageType) -> Self {
        Self(vec![Value::from(message_type.code())])
    }

    /// Append one field.
    pub fn push(mut self, field: impl Into<Value>) -> Self {
        self.0.push(field.into());
        self
    }

    pub fn fields(&self) -> &[Value] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// The raw type code, when the first field is a non-negative integer.
    pub fn type_code(&self) -> Option<u64> {
        self.0.first().and_then(Value::as_u64)
    }

    /// Resolve the first field against the supported message table.
    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        let code = self.type_code().ok_or_else(|| {
            ProtocolError::MalformedEnvelope(
                "first field must be an integer message type".to_string(),
            )
        })?;
        MessageType::from_code(code).ok_or(ProtocolError::UnknownMessageType(code))
    }
}

impl From<Vec<Value>> for Envelope {
    fn from(fields: Vec<Value>) -> Self {
        Self(fields)
    }
}

/// Parse envelope text.
pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;

    match value {
        Value::Array(fields) => Ok(Envelope(fields)),
        other => Err(ProtocolError::MalformedEnvelope(format!(
            "top-level value must be an array, got {}",
            json_kind(&other)
        ))),
    }
}

/// Render an envelope as text.
pub fn encode(envelope: &Envelope) -> String {
    Value::Array(envelope.0.clone()).to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
