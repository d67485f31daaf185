//! TODO list tools over a shared [`TodoStore`].

use std::sync::Arc;

use agent_core::todo::{deleted_message, TodoStore};
use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct AddTodoArgs {
    task: String,
}

#[derive(Debug, Deserialize)]
struct TodoIdArgs {
    todo_id: i64,
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|error| ToolError::InvalidArguments(error.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|error| ToolError::Execution(error.to_string()))
}

fn todo_id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "todo_id": {
                "type": "integer",
                "description": description
            }
        },
        "required": ["todo_id"]
    })
}

pub struct AddTodoTool {
    store: Arc<dyn TodoStore>,
}

impl AddTodoTool {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AddTodoTool {
    fn name(&self) -> &str {
        "add_todo"
    }

    fn description(&self) -> &str {
        "Add a new item to the TODO list. Returns the created item with its id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Description of the task"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: AddTodoArgs = parse_args(args)?;
        if args.task.trim().is_empty() {
            return Err(ToolError::InvalidArguments("task cannot be empty".to_string()));
        }
        let item = self.store.add(&args.task).await?;
        to_value(item)
    }
}

pub struct ListTodosTool {
    store: Arc<dyn TodoStore>,
}

impl ListTodosTool {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListTodosTool {
    fn name(&self) -> &str {
        "list_todos"
    }

    fn description(&self) -> &str {
        "List all TODO items in the order they were added."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let items = self.store.list().await?;
        to_value(items)
    }
}

pub struct CompleteTodoTool {
    store: Arc<dyn TodoStore>,
}

impl CompleteTodoTool {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CompleteTodoTool {
    fn name(&self) -> &str {
        "complete_todo"
    }

    fn description(&self) -> &str {
        "Mark a TODO item as completed."
    }

    fn parameters_schema(&self) -> Value {
        todo_id_schema("Id of the item to complete")
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: TodoIdArgs = parse_args(args)?;
        let item = self.store.complete(args.todo_id).await?;
        to_value(item)
    }
}

pub struct DeleteTodoTool {
    store: Arc<dyn TodoStore>,
}

impl DeleteTodoTool {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteTodoTool {
    fn name(&self) -> &str {
        "delete_todo"
    }

    fn description(&self) -> &str {
        "Delete a TODO item."
    }

    fn parameters_schema(&self) -> Value {
        todo_id_schema("Id of the item to delete")
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: TodoIdArgs = parse_args(args)?;
        self.store.delete(args.todo_id).await?;
        Ok(json!({ "message": deleted_message(args.todo_id) }))
    }
}
