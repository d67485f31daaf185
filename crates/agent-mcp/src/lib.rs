//! Bridge to external tool providers speaking MCP (Model Context Protocol).
//!
//! The client side connects to configured servers, discovers their tools and
//! proxies calls. The server side exposes any [`agent_core::ToolExecutor`]
//! over stdio so other agents can use our tools.

pub mod config;
pub mod error;
pub mod protocol;
pub mod transports;
pub mod types;

pub mod executor;
pub mod manager;
pub mod server;
pub mod tool_index;

pub use config::{McpConfig, McpServerConfig, TransportConfig};
pub use error::{McpError, Result};
pub use executor::{CompositeToolExecutor, McpToolExecutor};
pub use manager::McpServerManager;
pub use protocol::{McpProtocolClient, McpTransport};
pub use server::McpToolServer;
pub use tool_index::ToolIndex;
pub use transports::{SseTransport, StdioTransport, StreamTransport};
pub use types::*;
