use agent_core::tools::ToolError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server disconnected")]
    Disconnected,

    #[error("Server already running: {0}")]
    AlreadyRunning(String),
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        McpError::Transport(e.to_string())
    }
}

/// Only a missing tool is the caller's fault; every other bridge failure
/// means the provider is unavailable right now.
impl From<McpError> for ToolError {
    fn from(error: McpError) -> Self {
        match error {
            McpError::ToolNotFound(name) => ToolError::UnknownTool(name),
            other => ToolError::Unavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, McpError>;
