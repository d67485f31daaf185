use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;
use thiserror::Error;

use crate::tools::{validate_arguments, FunctionSchema, ToolError, ToolSchema};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),
}

/// Name-keyed table of local tools. Populated at startup, read-only afterwards.
pub struct ToolRegistry {
    tools: DashMap<String, SharedTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = tool.name().trim();

        if name.is_empty() {
            return Err(RegistryError::InvalidTool(
                "tool name cannot be empty".to_string(),
            ));
        }

        match self.tools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateTool(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Look up, validate, then run. The lookup guard is released before awaiting.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        validate_arguments(&tool.parameters_schema(), &args)?;
        tool.execute(args).await
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| entry.value().to_schema())
            .collect();
        tools.sort_by(|left, right| left.function.name.cmp(&right.function.name));
        tools
    }

    pub fn list_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "echoes its text argument"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args["text"].clone())
        }
    }

    #[test]
    fn duplicate_tool_registration() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool { name: "echo" }).unwrap();

        let duplicate = registry.register(EchoTool { name: "echo" });
        assert!(matches!(duplicate, Err(RegistryError::DuplicateTool(name)) if name == "echo"));
    }

    #[test]
    fn register_rejects_empty_tool_name() {
        let registry = ToolRegistry::new();
        let result = registry.register(EchoTool { name: "  " });
        assert!(
            matches!(result, Err(RegistryError::InvalidTool(reason)) if reason == "tool name cannot be empty")
        );
    }

    #[test]
    fn list_tools_is_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool { name: "zeta" }).unwrap();
        registry.register(EchoTool { name: "alpha" }).unwrap();

        let names: Vec<String> = registry
            .list_tools()
            .into_iter()
            .map(|schema| schema.function.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn invoke_validates_before_running() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool { name: "echo" }).unwrap();

        let ok = registry.invoke("echo", json!({"text": "hi"})).await;
        assert_eq!(ok, Ok(json!("hi")));

        let bad = registry.invoke("echo", json!({"text": 7})).await;
        assert!(matches!(bad, Err(ToolError::InvalidArguments(_))));

        let missing = registry.invoke("nope", json!({})).await;
        assert_eq!(missing, Err(ToolError::UnknownTool("nope".to_string())));
    }
}
