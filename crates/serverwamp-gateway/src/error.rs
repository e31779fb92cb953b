//! Gateway error types.

use thiserror::Error;

/// Errors that can occur in the gateway.
///
/// Protocol problems caused by the peer never show up here; the dispatcher
/// answers those on the wire.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket stream failed.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The transport can no longer carry messages.
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
