use agent_core::tools::{parse_tool_args, FunctionSchema, ToolCall, ToolError, ToolExecutor, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

use crate::manager::McpServerManager;
use crate::tool_index::ToolIndex;

/// Executes aliased tools by forwarding them to their MCP server.
pub struct McpToolExecutor {
    manager: Arc<McpServerManager>,
    index: Arc<ToolIndex>,
}

impl McpToolExecutor {
    pub fn new(manager: Arc<McpServerManager>) -> Self {
        let index = manager.tool_index();
        Self { manager, index }
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let tool_name = &call.function.name;
        let alias = self
            .index
            .lookup(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.clone()))?;

        debug!(
            "Executing MCP tool: {} (server: {}, original: {})",
            tool_name, alias.server_id, alias.original_name
        );

        let args = parse_tool_args(&call.function.arguments)?;
        let result = self
            .manager
            .call_tool(&alias.server_id, &alias.original_name, args)
            .await?;

        if result.is_error {
            return Err(ToolError::Execution(result.joined_text()));
        }
        Ok(result.to_payload())
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.index
            .tools()
            .into_iter()
            .map(|(alias, tool)| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: alias.alias,
                    description: tool.description,
                    parameters: tool.parameters,
                },
            })
            .collect()
    }
}

/// Local tools first, external tools second. A name offered by both is served
/// by the local tool.
pub struct CompositeToolExecutor {
    builtin: Arc<dyn ToolExecutor>,
    mcp: Arc<dyn ToolExecutor>,
}

impl CompositeToolExecutor {
    pub fn new(builtin: Arc<dyn ToolExecutor>, mcp: Arc<dyn ToolExecutor>) -> Self {
        let composite = Self { builtin, mcp };
        for name in composite.collisions() {
            error!(
                "External tool '{}' collides with a built-in tool; the built-in wins",
                name
            );
        }
        composite
    }

    fn builtin_names(&self) -> HashSet<String> {
        self.builtin
            .list_tools()
            .into_iter()
            .map(|schema| schema.function.name)
            .collect()
    }

    pub fn collisions(&self) -> Vec<String> {
        let local = self.builtin_names();
        self.mcp
            .list_tools()
            .into_iter()
            .map(|schema| schema.function.name)
            .filter(|name| local.contains(name))
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for CompositeToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        match self.builtin.execute(call).await {
            Err(ToolError::UnknownTool(_)) => self.mcp.execute(call).await,
            other => other,
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools = self.builtin.list_tools();
        let mut seen: HashSet<String> = tools.iter().map(|t| t.function.name.clone()).collect();
        tools.extend(
            self.mcp
                .list_tools()
                .into_iter()
                .filter(|schema| seen.insert(schema.function.name.clone())),
        );
        tools
    }
}
