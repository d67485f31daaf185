use async_trait::async_trait;
use dashmap::DashMap;

use crate::agent::Session;
use crate::storage::{Storage, StorageResult};

/// Non-durable checkpoints, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: DashMap<String, Session>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_session(&self, session: &Session) -> StorageResult<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> StorageResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn delete_session(&self, session_id: &str) -> StorageResult<bool> {
        Ok(self.sessions.remove(session_id).is_some())
    }
}
