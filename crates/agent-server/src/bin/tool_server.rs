//! Exposes the built-in tools to other agents as an MCP server on stdio.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use agent_core::SqliteStorage;
use agent_mcp::McpToolServer;
use agent_server::logging::init_logging;
use agent_tools::{BuiltinToolExecutor, WeatherTool};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "agent-tool-server")]
#[command(about = "MCP server for the calculator, TODO and weather tools")]
#[command(version)]
struct Cli {
    /// SQLite database holding the TODO list
    #[arg(long, env = "DATABASE_URL", default_value = "agent.db")]
    database_url: String,

    #[arg(long, env = "WEATHER_API_KEY", hide_env_values = true)]
    weather_api_key: Option<String>,

    #[arg(
        long,
        env = "WEATHER_BASE_URL",
        default_value = "https://api.openweathermap.org/data/2.5"
    )]
    weather_base_url: String,

    /// Per-call tool timeout in seconds
    #[arg(long, env = "TOOL_TIMEOUT_SECS", default_value_t = 30)]
    tool_timeout_secs: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let storage = Arc::new(SqliteStorage::new(&cli.database_url));
    storage.init().await.map_err(io::Error::other)?;
    log::info!("TODO store at {}", cli.database_url);

    let weather = WeatherTool::new(cli.weather_api_key).with_base_url(cli.weather_base_url);
    let tools = Arc::new(BuiltinToolExecutor::new(storage, weather));

    McpToolServer::new(tools)
        .with_name("agent-tools")
        .with_tool_timeout(Duration::from_secs(cli.tool_timeout_secs))
        .serve_stdio()
        .await
        .map_err(io::Error::other)
}
