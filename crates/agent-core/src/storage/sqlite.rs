use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::agent::{Message, Session};
use crate::storage::{Storage, StorageError, StorageResult};
use crate::todo::{TodoError, TodoItem, TodoStore};

/// SQLite-backed checkpoints and durable TODO records.
///
/// One connection is opened on first use and shared behind a mutex, so a
/// `:memory:` database lives as long as the storage. Statements run on the
/// blocking pool and the lock is never held across an await point.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            connection: Arc::new(Mutex::new(None)),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create tables if they are absent. Safe to call on every startup.
    pub async fn init(&self) -> StorageResult<()> {
        self.with_connection(|connection| {
            connection.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS checkpoints (
                    session_id TEXT PRIMARY KEY,
                    messages TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS todos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0
                );
                "#,
            )?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(&self, func: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let shared = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut slot = shared
                .lock()
                .map_err(|_| StorageError::Task("sqlite connection lock poisoned".to_string()))?;
            if slot.is_none() {
                *slot = Some(open_connection(&db_path)?);
            }
            match slot.as_mut() {
                Some(connection) => func(connection),
                None => Err(StorageError::Task("sqlite connection unavailable".to_string())),
            }
        })
        .await
        .map_err(|error| StorageError::Task(error.to_string()))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_session(&self, session: &Session) -> StorageResult<()> {
        let session_id = session.id.clone();
        let messages = serde_json::to_string(&session.messages)?;
        let created_at = session.created_at.to_rfc3339();
        let updated_at = session.updated_at.to_rfc3339();

        self.with_connection(move |connection| {
            connection.execute(
                r#"
                INSERT INTO checkpoints (session_id, messages, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(session_id) DO UPDATE SET
                    messages = excluded.messages,
                    updated_at = excluded.updated_at
                "#,
                params![session_id, messages, created_at, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_session(&self, session_id: &str) -> StorageResult<Option<Session>> {
        let session_id = session_id.to_string();

        self.with_connection(move |connection| {
            let row = connection
                .query_row(
                    "SELECT messages, created_at, updated_at FROM checkpoints WHERE session_id = ?1",
                    params![session_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((messages, created_at, updated_at)) = row else {
                return Ok(None);
            };

            let messages: Vec<Message> = serde_json::from_str(&messages)?;
            Ok(Some(Session {
                id: session_id,
                messages,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
            }))
        })
        .await
    }

    async fn delete_session(&self, session_id: &str) -> StorageResult<bool> {
        let session_id = session_id.to_string();

        self.with_connection(move |connection| {
            let removed = connection.execute(
                "DELETE FROM checkpoints WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl TodoStore for SqliteStorage {
    async fn add(&self, task: &str) -> Result<TodoItem, TodoError> {
        let task = task.to_string();

        self.with_connection(move |connection| {
            connection.execute(
                "INSERT INTO todos (task, completed) VALUES (?1, 0)",
                params![task],
            )?;
            Ok(TodoItem {
                id: connection.last_insert_rowid(),
                task,
                completed: false,
            })
        })
        .await
        .map_err(storage_failure)
    }

    async fn list(&self) -> Result<Vec<TodoItem>, TodoError> {
        self.with_connection(|connection| {
            let mut statement =
                connection.prepare("SELECT id, task, completed FROM todos ORDER BY id")?;
            let items = statement
                .query_map([], map_todo_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
        .await
        .map_err(storage_failure)
    }

    async fn complete(&self, id: i64) -> Result<TodoItem, TodoError> {
        let item = self
            .with_connection(move |connection| {
                let transaction = connection.transaction()?;
                let updated = transaction.execute(
                    "UPDATE todos SET completed = 1 WHERE id = ?1",
                    params![id],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let item = transaction.query_row(
                    "SELECT id, task, completed FROM todos WHERE id = ?1",
                    params![id],
                    map_todo_row,
                )?;
                transaction.commit()?;
                Ok(Some(item))
            })
            .await
            .map_err(storage_failure)?;

        item.ok_or(TodoError::NotFound(id))
    }

    async fn delete(&self, id: i64) -> Result<(), TodoError> {
        let removed = self
            .with_connection(move |connection| {
                Ok(connection.execute("DELETE FROM todos WHERE id = ?1", params![id])?)
            })
            .await
            .map_err(storage_failure)?;

        if removed == 0 {
            return Err(TodoError::NotFound(id));
        }
        Ok(())
    }
}

fn open_connection(path: &Path) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let connection = Connection::open(path)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

fn map_todo_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoItem> {
    Ok(TodoItem {
        id: row.get(0)?,
        task: row.get(1)?,
        completed: row.get::<_, i64>(2)? != 0,
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn storage_failure(error: StorageError) -> TodoError {
    TodoError::Storage(error.to_string())
}
