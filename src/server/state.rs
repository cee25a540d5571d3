use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use super::config::ChallengeKind;
use crate::{Error, Result, SecureRng};

const SESSION_ID_BYTES: usize = 8;

/// Bookkeeping for one connected client.
///
/// Holds nothing secret: the PRNG, budget and keys live in the session task.
#[derive(Clone, Debug)]
pub struct SessionData {
    /// Random session identifier, used in logs.
    pub session_id: String,
    pub peer: SocketAddr,
    pub kind: ChallengeKind,
    /// Unix timestamp of the connection.
    pub connected_at: u64,
}

impl SessionData {
    fn new(session_id: String, peer: SocketAddr, kind: ChallengeKind) -> Self {
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| unreachable!("System time is after UNIX_EPOCH"))
            .as_secs();
        Self {
            session_id,
            peer,
            kind,
            connected_at,
        }
    }
}

/// Registry of live sessions, shared between the accept loop and the operator console.
#[derive(Clone)]
pub struct ServerState {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    max_sessions: usize,
}

impl ServerState {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Registers a new session and returns its id.
    ///
    /// # Errors
    /// Returns an error if the server is at capacity.
    pub async fn register(&self, peer: SocketAddr, kind: ChallengeKind) -> Result<String> {
        let mut sessions = self.sessions.write().await;

        if sessions.len() >= self.max_sessions {
            return Err(Error::AtCapacity(format!(
                "server is full ({} sessions)",
                self.max_sessions
            )));
        }

        let mut rng = SecureRng::new();
        let session_id = loop {
            let candidate = rng.token(SESSION_ID_BYTES);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        sessions.insert(
            session_id.clone(),
            SessionData::new(session_id.clone(), peer, kind),
        );
        Ok(session_id)
    }

    /// Forgets a session. Unknown ids are ignored.
    pub async fn unregister(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Snapshot of live sessions, oldest first.
    pub async fn sessions(&self) -> Vec<SessionData> {
        let mut sessions: Vec<SessionData> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.connected_at);
        sessions
    }
}
