pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent::Session;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task join error: {0}")]
    Task(String),
}

/// Checkpoint store for turn state, keyed by session id.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_session(&self, session: &Session) -> StorageResult<()>;
    async fn load_session(&self, session_id: &str) -> StorageResult<Option<Session>>;
    /// Returns whether a checkpoint existed.
    async fn delete_session(&self, session_id: &str) -> StorageResult<bool>;
}
