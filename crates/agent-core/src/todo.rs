use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::tools::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: i64,
    pub task: String,
    pub completed: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TodoError {
    #[error("TODO {0} not found")]
    NotFound(i64),

    #[error("TODO storage error: {0}")]
    Storage(String),
}

impl From<TodoError> for ToolError {
    fn from(error: TodoError) -> Self {
        match error {
            TodoError::NotFound(_) => ToolError::NotFound(error.to_string()),
            TodoError::Storage(message) => ToolError::Execution(message),
        }
    }
}

/// Confirmation text returned by every backend after a delete.
pub fn deleted_message(id: i64) -> String {
    format!("TODO {id} deleted")
}

/// CRUD over an ordered TODO collection.
///
/// Ids are sequential from 1 and never reused, even after a delete.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn add(&self, task: &str) -> Result<TodoItem, TodoError>;
    async fn list(&self) -> Result<Vec<TodoItem>, TodoError>;
    async fn complete(&self, id: i64) -> Result<TodoItem, TodoError>;
    async fn delete(&self, id: i64) -> Result<(), TodoError>;
}

#[derive(Debug)]
struct TodoState {
    items: Vec<TodoItem>,
    next_id: i64,
}

/// Process-wide store that lives as long as the service.
///
/// Writers are serialised by an internal mutex; the contents are not shared
/// across processes.
#[derive(Debug)]
pub struct InMemoryTodoStore {
    state: Mutex<TodoState>,
}

impl Default for InMemoryTodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TodoState {
                items: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn add(&self, task: &str) -> Result<TodoItem, TodoError> {
        let mut state = self.state.lock().await;
        let item = TodoItem {
            id: state.next_id,
            task: task.to_string(),
            completed: false,
        };
        state.next_id += 1;
        state.items.push(item.clone());
        Ok(item)
    }

    async fn list(&self) -> Result<Vec<TodoItem>, TodoError> {
        Ok(self.state.lock().await.items.clone())
    }

    async fn complete(&self, id: i64) -> Result<TodoItem, TodoError> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(TodoError::NotFound(id))?;
        item.completed = true;
        Ok(item.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), TodoError> {
        let mut state = self.state.lock().await;
        let position = state
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(TodoError::NotFound(id))?;
        state.items.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_assigns_sequential_ids() {
        let store = InMemoryTodoStore::new();

        let first = store.add("Buy milk").await.unwrap();
        assert_eq!(first.id, 1);
        assert!(!first.completed);

        let second = store.add("Walk dog").await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn complete_keeps_task_text() {
        let store = InMemoryTodoStore::new();
        store.add("Buy milk").await.unwrap();

        let done = store.complete(1).await.unwrap();
        assert!(done.completed);
        assert_eq!(done.task, "Buy milk");
        assert_eq!(store.complete(999).await, Err(TodoError::NotFound(999)));
    }

    #[tokio::test]
    async fn delete_removes_and_ids_are_not_reused() {
        let store = InMemoryTodoStore::new();
        store.add("a").await.unwrap();
        store.add("b").await.unwrap();

        store.delete(1).await.unwrap();
        let remaining: Vec<i64> = store.list().await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![2]);
        assert_eq!(store.delete(999).await, Err(TodoError::NotFound(999)));

        let next = store.add("c").await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn not_found_maps_to_tool_error() {
        let error: ToolError = TodoError::NotFound(7).into();
        assert_eq!(error, ToolError::NotFound("TODO 7 not found".to_string()));
    }
}
