//! Session identity.

use crate::id::IdGenerator;
use std::fmt;

/// Server-side identity of one connection.
///
/// Created when the connection is accepted and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    session_id: u64,
    remote_address: Option<String>,
}

impl Session {
    /// Create a session with an explicit id.
    pub fn new(session_id: u64, remote_address: Option<String>) -> Self {
        Self {
            session_id,
            remote_address,
        }
    }

    /// Create a session with an id drawn from `ids`.
    pub fn open(ids: &dyn IdGenerator, remote_address: Option<String>) -> Self {
        Self::new(ids.next_id(), remote_address)
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.remote_address {
            Some(remote) => write!(f, "{}@{}", self.session_id, remote),
            None => write!(f, "{}", self.session_id),
        }
    }
}
