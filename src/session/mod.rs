//! Session identity and in-memory checkpoints.
//!
//! A [`Session`] is minted once per UI session and threaded through every turn.
//! The conversation for that session is saved into a [`CheckpointStore`] after
//! each turn and loaded again at the start of the next.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::Conversation;
use crate::error::KrutrimError;

/// Random identifier keying a session's checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = KrutrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| KrutrimError::InvalidArgument(format!("invalid session id '{s}': {e}")))
    }
}

/// A UI session. Cloning keeps the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Start a session with a fresh id.
    pub fn start() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Resume a session under a known id.
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Saved state of one session's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: SessionId,
    pub conversation: Conversation,
    /// Starts at 1 and increases with every save.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Keyed storage for session checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint for the session, if any.
    async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, KrutrimError>;

    /// Store the conversation as the session's new checkpoint.
    async fn save(&self, conversation: &Conversation) -> Result<Checkpoint, KrutrimError>;

    /// Drop a session's checkpoint. Returns whether one existed.
    async fn remove(&self, session_id: &SessionId) -> Result<bool, KrutrimError>;

    /// Ids of all sessions with a checkpoint.
    async fn sessions(&self) -> Result<Vec<SessionId>, KrutrimError>;
}

/// Process-local checkpoint store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<SessionId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Checkpoint>, KrutrimError> {
        Ok(self.checkpoints.read().await.get(session_id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<Checkpoint, KrutrimError> {
        let mut checkpoints = self.checkpoints.write().await;
        let version = checkpoints
            .get(&conversation.id())
            .map_or(1, |previous| previous.version + 1);
        let checkpoint = Checkpoint {
            session_id: conversation.id(),
            conversation: conversation.clone(),
            version,
            updated_at: Utc::now(),
        };
        checkpoints.insert(conversation.id(), checkpoint.clone());
        Ok(checkpoint)
    }

    async fn remove(&self, session_id: &SessionId) -> Result<bool, KrutrimError> {
        Ok(self.checkpoints.write().await.remove(session_id).is_some())
    }

    async fn sessions(&self) -> Result<Vec<SessionId>, KrutrimError> {
        let mut ids: Vec<SessionId> = self.checkpoints.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
