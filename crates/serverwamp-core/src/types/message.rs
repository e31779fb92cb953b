//! WAMP message-type codes.

use std::fmt;

/// Message types understood by this server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum MessageType {
    Hello = 1,
    Welcome = 2,
    Abort = 3,
    Error = 8,
    Publish = 16,
    Published = 17,
    Subscribe = 32,
    Subscribed = 33,
    Unsubscribe = 34,
    Unsubscribed = 35,
    Event = 36,
    Call = 48,
    CallResult = 50,
    Invocation = 68,
}

impl MessageType {
    /// Every supported type, in code order.
    pub const ALL: [MessageType; 14] = [
        Self::Hello,
        Self::Welcome,
        Self::Abort,
        Self::Error,
        Self::Publish,
        Self::Published,
        Self::Subscribe,
        Self::Subscribed,
        Self::Unsubscribe,
        Self::Unsubscribed,
        Self::Event,
        Self::Call,
        Self::CallResult,
        Self::Invocation,
    ];

    /// Look up a type by its wire code.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// The wire code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Types only a server may send; a client sending one is unauthorized.
    pub fn is_server_only(self) -> bool {
        matches!(self, Self::Event | Self::Invocation)
    }

    /// Types this server role does not implement.
    pub fn is_unimplemented(self) -> bool {
        matches!(self, Self::Publish | Self::Published)
    }

    /// Upper-case protocol name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => "HELLO",
            Self::Welcome => "WELCOME",
            Self::Abort => "ABORT",
            Self::Error => "ERROR",
            Self::Publish => "PUBLISH",
            Self::Published => "PUBLISHED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Subscribed => "SUBSCRIBED",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Unsubscribed => "UNSUBSCRIBED",
            Self::Event => "EVENT",
            Self::Call => "CALL",
            Self::CallResult => "CALL_RESULT",
            Self::Invocation => "INVOCATION",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
