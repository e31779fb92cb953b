//! WAMP session layer for serverwamp.
//!
//! This crate provides:
//! - The per-connection protocol dispatcher and its state machine
//! - Capability traits for the RPC executor, subscription registry and open hook
//! - An RPC router and an in-memory broker implementing those capabilities
//! - A WebSocket gateway that runs one dispatcher per connection

pub mod broker;
pub mod capability;
pub mod dispatcher;
pub mod error;
pub mod outbound;
pub mod rpc;
pub mod server;
pub mod session;

pub use broker::Broker;
pub use capability::{
    Capabilities, MemoryTransport, RpcExecutor, SessionOpenHandler, SubscribeHandler, Transport,
    UnsubscribeHandler,
};
pub use dispatcher::{Dispatcher, EventPublisher, SessionState};
pub use error::GatewayError;
pub use rpc::{DefaultKwarg, FnProcedure, ProcedureHandler, RouteSet, RpcRouter};
pub use server::{Gateway, GatewayConfig, HealthStatus, WAMP_SUBPROTOCOL};
pub use session::{LiveSession, SessionRegistry};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
