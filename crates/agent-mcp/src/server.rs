use agent_core::tools::{execute_tool_call, ToolCall, ToolExecutor};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::models::*;
use crate::types::McpCallResult;

/// Serves a [`ToolExecutor`] to MCP clients as newline-delimited JSON-RPC.
pub struct McpToolServer {
    tools: Arc<dyn ToolExecutor>,
    info: Implementation,
    tool_timeout: Duration,
}

impl McpToolServer {
    pub fn new(tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            tools,
            info: Implementation::current(),
            tool_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Answer requests until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP tool server '{}' listening", self.info.name);
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                let encoded = serde_json::to_string(&response)?;
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("MCP client closed the connection");
        Ok(())
    }

    /// Handle one inbound line. Notifications and stray responses produce no
    /// reply.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match JsonRpcMessage::parse(line) {
            Ok(JsonRpcMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!("Notification: {}", notification.method);
                None
            }
            Ok(JsonRpcMessage::Response(_)) => {
                warn!("Ignoring unexpected response from client");
                None
            }
            Err(e) => Some(JsonRpcResponse::failure(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            )),
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::failure(id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        }

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.list_tools()),
            "tools/call" => match self.call_tool(request.params).await {
                Ok(result) => match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
                },
                Err(message) => JsonRpcResponse::failure(id, INVALID_PARAMS, message),
            },
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": self.info,
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<McpToolInfo> = self
            .tools
            .list_tools()
            .into_iter()
            .map(|schema| McpToolInfo {
                name: schema.function.name,
                description: schema.function.description,
                input_schema: Some(schema.function.parameters),
            })
            .collect();
        json!({ "tools": tools })
    }

    /// Tool failures are results with `isError`; only malformed params are
    /// protocol errors.
    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<McpCallResult, String> {
        let params: McpToolCallRequest = params
            .ok_or_else(|| "tools/call requires params".to_string())
            .and_then(|p| serde_json::from_value(p).map_err(|e| format!("Invalid params: {}", e)))?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let call = ToolCall::new(
            format!("mcp-{}", params.name),
            params.name.clone(),
            arguments.to_string(),
        );

        debug!("tools/call {}", params.name);
        let result = execute_tool_call(&call, self.tools.as_ref(), self.tool_timeout).await;
        Ok(McpCallResult::text(result.content(), !result.is_success()))
    }
}
