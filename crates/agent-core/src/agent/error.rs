use thiserror::Error;

use crate::storage::StorageError;

/// Failures that end a turn in the FAILED state.
///
/// Tool failures never show up here; they are folded into tool messages
/// by the executor and handed back to the model.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model backend failure: {0}")]
    ModelBackend(String),

    #[error("Step limit exceeded after {0} rounds")]
    StepLimitExceeded(usize),

    #[error("cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
