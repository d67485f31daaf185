pub mod config;
pub mod runner;
pub mod stream;

pub use config::AgentLoopConfig;
pub use runner::{run_agent_loop, should_continue, LoopState, ToolCallRecord, TurnOutcome};
pub use stream::emitter::agent_event_stream;
