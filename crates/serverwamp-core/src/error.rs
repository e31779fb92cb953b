//! Error types for serverwamp core.

use crate::types::MessageType;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Problems with an inbound envelope, classified by how the session reacts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Text is not JSON, not an array, or lacks a usable type code or request id field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Type code is not part of the supported message table.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u64),

    /// Peer sent a message type it is not allowed to send.
    ///
    /// `request_id` is field 1 exactly as received.
    #[error("{message_type} (request {request_id}) is not accepted from a client")]
    IllegalForRole {
        message_type: MessageType,
        request_id: Value,
    },

    /// A known request carried fields of the wrong type, its request id
    /// included. `request_id` is field 1 exactly as received.
    #[error("invalid {message_type} request {request_id}: {reason}")]
    RequestValidation {
        message_type: MessageType,
        request_id: Value,
        reason: String,
    },
}

impl ProtocolError {
    /// Whether this error ends the session with an ABORT.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope(_) | Self::UnknownMessageType(_)
        )
    }
}

/// A typed WAMP error returned by a capability.
///
/// Maps one-to-one onto the ERROR envelope sent back to the peer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{uri}")]
pub struct WampError {
    uri: String,
    details: Map<String, Value>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl WampError {
    /// Create an error with the given dotted error URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            details: Map::new(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Set the details mapping.
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Set the positional payload.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set the keyword payload.
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }
}

/// Failure reported by an injected capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// Deliberate, typed rejection of the request.
    #[error("WAMP error: {0}")]
    Wamp(#[from] WampError),

    /// Unexpected failure; the text is forwarded to the peer.
    #[error("{0}")]
    Fault(String),
}

impl CapabilityError {
    /// Build a fault from anything printable.
    pub fn fault(message: impl std::fmt::Display) -> Self {
        Self::Fault(message.to_string())
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
