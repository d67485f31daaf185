use std::path::PathBuf;
use std::time::Duration;

use agent_loop::AgentLoopConfig;
use clap::{Parser, ValueEnum};

/// Where TODO items live for the HTTP agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TodoBackend {
    /// Process-local list, lost on restart
    Memory,
    /// SQLite table next to the checkpoints
    Durable,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "agent-server")]
#[command(about = "Conversational agent HTTP server")]
#[command(version)]
pub struct Settings {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Enable debug mode
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Log level, ignored when debug is on or RUST_LOG is set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// API key for the model backend
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub llm_base_url: String,

    #[arg(long, env = "MODEL_NAME", default_value = "openai/gpt-4o")]
    pub model_name: String,

    #[arg(long, env = "MODEL_TEMPERATURE", default_value = "0.7")]
    pub model_temperature: f32,

    #[arg(long, env = "MODEL_MAX_TOKENS", default_value = "2000")]
    pub model_max_tokens: u32,

    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value = "120")]
    pub model_timeout_secs: u64,

    /// Model round trips allowed per turn
    #[arg(long, env = "MAX_ROUNDS", default_value = "25")]
    pub max_rounds: usize,

    #[arg(long, env = "TOOL_TIMEOUT_SECS", default_value = "30")]
    pub tool_timeout_secs: u64,

    /// Run the tool requests of one round concurrently
    #[arg(long, env = "PARALLEL_TOOLS")]
    pub parallel_tools: bool,

    /// SQLite database path (`:memory:` allowed)
    #[arg(long, env = "DATABASE_URL", default_value = "agent.db")]
    pub database_url: String,

    #[arg(long, env = "TODO_BACKEND", value_enum, default_value = "memory")]
    pub todo_backend: TodoBackend,

    /// External tool server definitions
    #[arg(long, env = "MCP_CONFIG_PATH", default_value = "mcp_servers.json")]
    pub mcp_config_path: PathBuf,

    /// Comma separated allowed origins, `*` for any
    #[arg(long, env = "CORS_ORIGINS", default_value = "http://localhost:3000")]
    pub cors_origins: String,

    /// Comma separated accepted values of the X-API-Key header
    #[arg(long, env = "API_KEYS", default_value = "", hide_env_values = true)]
    pub api_keys: String,

    #[arg(long, env = "AUTH_ENABLED")]
    pub auth_enabled: bool,

    /// Requests per client per minute, 0 disables the limit
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value = "100")]
    pub rate_limit_per_minute: u32,

    #[arg(long, env = "WEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    #[arg(
        long,
        env = "WEATHER_BASE_URL",
        default_value = "https://api.openweathermap.org/data/2.5"
    )]
    pub weather_base_url: String,

    /// Per-round trace logging of the agent loop
    #[arg(long, env = "TRACING_ENABLED")]
    pub tracing_enabled: bool,
}

impl Settings {
    pub fn cors_origins(&self) -> Vec<String> {
        split_list(&self.cors_origins)
    }

    pub fn api_keys(&self) -> Vec<String> {
        split_list(&self.api_keys)
    }

    /// Effective log filter when RUST_LOG is not set.
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    pub fn loop_config(&self) -> AgentLoopConfig {
        AgentLoopConfig {
            max_rounds: self.max_rounds,
            model_timeout: Duration::from_secs(self.model_timeout_secs),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            parallel_tools: self.parallel_tools,
            trace: self.tracing_enabled,
            ..AgentLoopConfig::default()
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
