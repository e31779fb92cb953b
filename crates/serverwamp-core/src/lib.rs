//! # serverwamp-core
//!
//! Wire-level building blocks for the serverwamp session layer.
//!
//! This crate has no async runtime dependency and provides:
//!
//! - **Identifiers**: 53-bit session/publication id generation
//! - **Codec**: Conversion between JSON array text and [`Envelope`]s
//! - **Types**: Message-type codes and immutable request/response/event values
//! - **Errors**: The protocol error taxonomy and well-known error URIs
//! - **Configuration**: Loading and validation of the server config file

pub mod codec;
pub mod config;
pub mod error;
pub mod id;
pub mod paths;
pub mod types;
pub mod uri;

// Re-exports for convenience
pub use codec::{decode, encode, Envelope};
pub use config::Config;
pub use error::{CapabilityError, ConfigError, ProtocolError, WampError};
pub use id::{IdGenerator, RandomIdGenerator, SequentialIdGenerator, MAX_ID};
pub use types::*;
