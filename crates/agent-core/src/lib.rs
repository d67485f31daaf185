pub mod agent;
pub mod storage;
pub mod todo;
pub mod tools;

pub use agent::events::AgentEvent;
pub use agent::types::{Message, Role, Session};
pub use agent::AgentError;
pub use storage::{MemoryStorage, SqliteStorage, Storage, StorageError};
pub use todo::{InMemoryTodoStore, TodoError, TodoItem, TodoStore};
pub use tools::{
    execute_tool_call, parse_tool_args, FunctionCall, FunctionSchema, Tool, ToolCall,
    ToolCallAccumulator, ToolError, ToolErrorKind, ToolExecutor, ToolOutcome, ToolRegistry,
    ToolResult, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
