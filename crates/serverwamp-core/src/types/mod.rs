//! Core type definitions.

mod event;
mod message;
mod request;
mod response;
mod session;

pub use event::*;
pub use message::*;
pub use request::*;
pub use response::*;
pub use session::*;
