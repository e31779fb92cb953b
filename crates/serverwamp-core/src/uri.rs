//! Well-known WAMP error and reason URIs.

/// Peer sent a message type this server role does not implement.
pub const NOT_IMPLEMENTED: &str = "wamp.error.not_implemented";

/// Peer sent a message type only the server may send.
pub const NOT_AUTHORIZED: &str = "wamp.error.not_authorized";

/// Session aborted because the peer broke the protocol.
pub const PROTOCOL_VIOLATION: &str = "wamp.error.protocol_violation";

/// A capability failed unexpectedly while handling a request.
pub const EXCEPTION_DURING_RPC_CALL: &str = "wamp.error.exception_during_rpc_call";

/// A request carried fields of the wrong type.
pub const INVALID_ARGUMENT: &str = "wamp.error.invalid_argument";

/// A topic or procedure URI is not acceptable.
pub const INVALID_URI: &str = "wamp.error.invalid_uri";

/// No procedure is registered under the called URI.
pub const NO_SUCH_PROCEDURE: &str = "wamp.error.no_such_procedure";

/// The session holds no subscription with the given id.
pub const NO_SUCH_SUBSCRIPTION: &str = "wamp.error.no_such_subscription";
