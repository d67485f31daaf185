use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use agent_core::{AgentError, StorageError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Rate limit exceeded: {0} requests per minute")]
    RateLimited(u32),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::NotFound(_) => "not_found",
            ApiError::Agent(AgentError::ModelBackend(_)) => "model_backend_error",
            ApiError::Agent(AgentError::StepLimitExceeded(_)) => "step_limit_exceeded",
            ApiError::Agent(AgentError::Cancelled) => "cancelled",
            ApiError::Agent(AgentError::Storage(_)) | ApiError::Storage(_) => "storage_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Agent(AgentError::ModelBackend(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Agent(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(JsonErrorWrapper {
            error: JsonError {
                message: self.to_string(),
                r#type: self.error_type().to_string(),
            },
        })
    }
}

/// Startup failures that keep the server from binding.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open database {path}: {source}")]
    Database { path: String, source: StorageError },
}
