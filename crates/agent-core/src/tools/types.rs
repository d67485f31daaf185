use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::{AgentEvent, Message};
use crate::tools::{ToolError, ToolErrorKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as produced by the model.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_type: default_tool_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: Value },
    Failure { kind: ToolErrorKind, message: String },
}

/// Result of one tool invocation. Exactly one is produced per tool request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, payload: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.function.name.clone(),
            outcome: ToolOutcome::Success { payload },
        }
    }

    pub fn failure(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.function.name.clone(),
            outcome: ToolOutcome::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    /// Structured value shown to clients: the payload, or an `error` object.
    pub fn result_value(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success { payload } => payload.clone(),
            ToolOutcome::Failure { kind, message } => json!({
                "error": {
                    "kind": kind,
                    "message": message,
                }
            }),
        }
    }

    /// Text placed in the tool message. Plain string payloads are passed through.
    pub fn content(&self) -> String {
        match self.result_value() {
            Value::String(text) => text,
            other => other.to_string(),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, &self.tool_name, self.content())
    }

    pub fn to_event(&self) -> AgentEvent {
        AgentEvent::ToolResult {
            id: self.tool_call_id.clone(),
            tool_name: self.tool_name.clone(),
            result: self.result_value(),
            success: self.is_success(),
        }
    }
}
