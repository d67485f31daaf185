use std::sync::Arc;

use agent_core::todo::TodoStore;
use agent_core::tools::{
    parse_tool_args, RegistryError, Tool, ToolCall, ToolError, ToolExecutor, ToolRegistry,
    ToolSchema,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{
    AddTodoTool, CalculatorTool, CompleteTodoTool, DeleteTodoTool, ListTodosTool, WeatherTool,
};

pub const BUILTIN_TOOL_NAMES: [&str; 6] = [
    "calculate",
    "add_todo",
    "list_todos",
    "complete_todo",
    "delete_todo",
    "get_weather",
];

/// Executor for local tools, dispatching by name through a [`ToolRegistry`].
pub struct BuiltinToolExecutor {
    registry: ToolRegistry,
}

impl BuiltinToolExecutor {
    /// All built-in tools over the given TODO store and weather configuration.
    pub fn new(todo_store: Arc<dyn TodoStore>, weather: WeatherTool) -> Self {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, todo_store, weather);
        Self { registry }
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }
}

fn register_builtin_tools(
    registry: &ToolRegistry,
    todo_store: Arc<dyn TodoStore>,
    weather: WeatherTool,
) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(CalculatorTool::new()),
        Arc::new(AddTodoTool::new(todo_store.clone())),
        Arc::new(ListTodosTool::new(todo_store.clone())),
        Arc::new(CompleteTodoTool::new(todo_store.clone())),
        Arc::new(DeleteTodoTool::new(todo_store)),
        Arc::new(weather),
    ];

    for tool in tools {
        if let Err(error) = registry.register_shared(tool) {
            log::error!("Failed to register built-in tool: {}", error);
        }
    }
}

#[async_trait]
impl ToolExecutor for BuiltinToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let args = parse_tool_args(&call.function.arguments)?;
        self.registry.invoke(&call.function.name, args).await
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.registry.list_tools()
    }
}

/// Builder for an executor holding a chosen subset of tools.
#[derive(Default)]
pub struct BuiltinToolExecutorBuilder {
    registry: ToolRegistry,
}

impl BuiltinToolExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_tools(self, todo_store: Arc<dyn TodoStore>, weather: WeatherTool) -> Self {
        register_builtin_tools(&self.registry, todo_store, weather);
        self
    }

    pub fn with_tool<T: Tool + 'static>(self, tool: T) -> Result<Self, RegistryError> {
        self.registry.register(tool)?;
        Ok(self)
    }

    pub fn build(self) -> BuiltinToolExecutor {
        BuiltinToolExecutor {
            registry: self.registry,
        }
    }
}
