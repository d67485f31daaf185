use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use crate::tools::{ToolCall, ToolError, ToolResult, ToolSchema};

pub type Result<T> = std::result::Result<T, ToolError>;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<Value>;
    fn list_tools(&self) -> Vec<ToolSchema>;
}

pub fn parse_tool_args(arguments: &str) -> Result<Value> {
    let args_raw = arguments.trim();

    if args_raw.is_empty() {
        return Ok(serde_json::json!({}));
    }

    serde_json::from_str(args_raw)
        .map_err(|error| ToolError::InvalidArguments(format!("Invalid JSON arguments: {error}")))
}

/// Run one tool request to completion and always produce a result.
///
/// Handler errors, panics and overrunning `timeout` are all folded into a
/// failure outcome carrying the request id.
pub async fn execute_tool_call(
    call: &ToolCall,
    tools: &dyn ToolExecutor,
    timeout: Duration,
) -> ToolResult {
    let guarded = AssertUnwindSafe(tools.execute(call)).catch_unwind();

    let outcome = match tokio::time::timeout(timeout, guarded).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(ToolError::Execution(panic_message(panic))),
        Err(_) => Err(ToolError::Unavailable(format!(
            "tool '{}' did not respond within {}s",
            call.function.name,
            timeout.as_secs_f64()
        ))),
    };

    match outcome {
        Ok(payload) => ToolResult::success(call, payload),
        Err(error) => {
            log::warn!(
                "Tool '{}' ({}) failed: {}",
                call.function.name,
                call.id,
                error
            );
            ToolResult::failure(call, &error)
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("tool panicked: {message}")
    } else {
        "tool panicked".to_string()
    }
}
