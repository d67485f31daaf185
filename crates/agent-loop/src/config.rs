use std::sync::Arc;
use std::time::Duration;

use agent_core::storage::Storage;

pub const DEFAULT_MAX_ROUNDS: usize = 25;
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
Use `calculate` for arithmetic, the TODO tools (`add_todo`, `list_todos`, `complete_todo`, \
`delete_todo`) to manage the user's task list, and `get_weather` for current weather in a city. \
Tools prefixed with `mcp__` are provided by external servers. When a tool fails, explain the \
failure to the user instead of retrying blindly.";

/// Configuration for the agent loop.
#[derive(Clone)]
pub struct AgentLoopConfig {
    /// DECIDING/ACTING round trips allowed before the turn fails
    pub max_rounds: usize,
    /// Bound on one model call, including consuming its stream
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    /// Run the tool requests of one round concurrently
    pub parallel_tools: bool,
    /// Prepended when the history has no system message
    pub system_prompt: Option<String>,
    /// Checkpoint store, written after every completed round
    pub storage: Option<Arc<dyn Storage>>,
    /// Log per-round details at info level
    pub trace: bool,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            parallel_tools: false,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            storage: None,
            trace: false,
        }
    }
}

impl AgentLoopConfig {
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }
}
