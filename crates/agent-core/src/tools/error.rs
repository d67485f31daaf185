use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tool-level failures. These never escape the executor boundary; each one
/// is encoded into the tool message handed back to the model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("{0}")]
    NotFound(String),

    #[error("City '{0}' not found")]
    CityNotFound(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    ToolUnavailable,
    DivisionByZero,
    InvalidExpression,
    NotFound,
    CityNotFound,
    InvalidCredentials,
    Timeout,
    ProviderError,
    ExecutionFailed,
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ToolError::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            ToolError::Unavailable(_) => ToolErrorKind::ToolUnavailable,
            ToolError::DivisionByZero => ToolErrorKind::DivisionByZero,
            ToolError::InvalidExpression(_) => ToolErrorKind::InvalidExpression,
            ToolError::NotFound(_) => ToolErrorKind::NotFound,
            ToolError::CityNotFound(_) => ToolErrorKind::CityNotFound,
            ToolError::InvalidCredentials(_) => ToolErrorKind::InvalidCredentials,
            ToolError::Timeout(_) => ToolErrorKind::Timeout,
            ToolError::Provider(_) => ToolErrorKind::ProviderError,
            ToolError::Execution(_) => ToolErrorKind::ExecutionFailed,
        }
    }
}
