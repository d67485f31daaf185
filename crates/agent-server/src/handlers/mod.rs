pub mod chat;
pub mod health;
pub mod history;
pub mod sessions;
pub mod stop;
pub mod stream;
pub mod tools;

use uuid::Uuid;

use crate::error::ApiError;

/// Trimmed-nonempty user message, or a 422.
pub(crate) fn require_message(message: Option<&str>) -> Result<String, ApiError> {
    match message {
        Some(message) if !message.trim().is_empty() => Ok(message.to_string()),
        Some(_) => Err(ApiError::Validation("message must not be empty".to_string())),
        None => Err(ApiError::Validation("message is required".to_string())),
    }
}

/// Caller supplied session id, or a fresh one.
pub(crate) fn resolve_session_id(session_id: Option<&str>) -> String {
    session_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
