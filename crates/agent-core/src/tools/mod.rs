pub mod accumulator;
pub mod error;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod types;

pub use accumulator::{finalize_tool_calls, PartialToolCall, ToolCallAccumulator};
pub use error::{ToolError, ToolErrorKind};
pub use executor::{execute_tool_call, parse_tool_args, ToolExecutor};
pub use registry::{RegistryError, SharedTool, Tool, ToolRegistry};
pub use schema::validate_arguments;
pub use types::{FunctionCall, FunctionSchema, ToolCall, ToolOutcome, ToolResult, ToolSchema};
