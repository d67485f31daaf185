use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool metadata advertised by an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of a `tools/call`, shared by the client and the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCallResult {
    pub content: Vec<McpContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl McpCallResult {
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![McpContentItem::Text { text: text.into() }],
            is_error,
        }
    }

    /// All text items joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                McpContentItem::Text { text } => Some(text.as_str()),
                McpContentItem::Resource { resource } => resource.text.as_deref(),
                McpContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Payload handed back to the agent loop. A single text item holding JSON
    /// is unwrapped so structured results stay structured.
    pub fn to_payload(&self) -> Value {
        let text = self.joined_text();
        if text.is_empty() {
            return serde_json::to_value(&self.content).unwrap_or(Value::Null);
        }
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: McpResource,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Connecting,
    Ready,
    Stopped,
    Error,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Connecting => write!(f, "connecting"),
            ServerStatus::Ready => write!(f, "ready"),
            ServerStatus::Stopped => write!(f, "stopped"),
            ServerStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    pub tool_count: usize,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            status: ServerStatus::Stopped,
            last_error: None,
            connected_at: None,
            tool_count: 0,
        }
    }
}

/// Maps the model-facing alias back to a server and its own tool name.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAlias {
    pub alias: String,
    pub server_id: String,
    pub original_name: String,
}

/// Outcome of connecting every configured server at startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub connected: Vec<ConnectedServer>,
    pub failed: Vec<FailedServer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectedServer {
    pub name: String,
    pub tool_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedServer {
    pub name: String,
    pub reason: String,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
