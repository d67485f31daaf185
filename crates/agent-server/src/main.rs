use agent_server::logging::init_logging;
use agent_server::{run_server, Settings};
use clap::Parser;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = Settings::parse();
    init_logging(settings.log_filter());

    log::info!("Starting agent server v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Model configuration:");
    log::info!("  Base URL: {}", settings.llm_base_url);
    log::info!("  Model: {}", settings.model_name);
    log::info!(
        "  Max rounds: {}, parallel tools: {}",
        settings.max_rounds,
        settings.parallel_tools
    );

    if settings.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Database: {}", settings.database_url);
        log::debug!("  TODO backend: {:?}", settings.todo_backend);
        log::debug!("  MCP config: {}", settings.mcp_config_path.display());
        log::debug!("  Rate limit: {}/min", settings.rate_limit_per_minute);
    }

    run_server(settings).await
}
