//! Live session tracking.

use serverwamp_core::Session;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A connected session.
#[derive(Debug, Clone)]
pub struct LiveSession {
    /// Session identity.
    pub session: Session,

    /// Connect timestamp.
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl LiveSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            connected_at: chrono::Utc::now(),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session.session_id()
    }
}

/// Registry of connected sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, LiveSession>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session and return its entry.
    pub async fn insert(&self, session: Session) -> LiveSession {
        let live = LiveSession::new(session);
        let mut sessions = self.sessions.write().await;
        sessions.insert(live.session_id(), live.clone());
        live
    }

    /// Get a session by id.
    pub async fn get(&self, session_id: u64) -> Option<LiveSession> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).cloned()
    }

    /// Remove a session.
    pub async fn remove(&self, session_id: u64) -> Option<LiveSession> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&session_id)
    }

    /// All live session ids.
    pub async fn list(&self) -> Vec<u64> {
        let sessions = self.sessions.read().await;
        sessions.keys().copied().collect()
    }

    pub async fn count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}
