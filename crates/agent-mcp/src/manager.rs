use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{McpConfig, McpServerConfig, TransportConfig};
use crate::error::{McpError, Result};
use crate::protocol::{McpProtocolClient, McpTransport};
use crate::tool_index::ToolIndex;
use crate::transports::{SseTransport, StdioTransport};
use crate::types::{
    ConnectedServer, FailedServer, McpCallResult, RuntimeInfo, ServerStatus, StartupReport,
};

struct ServerRuntime {
    config: McpServerConfig,
    client: McpProtocolClient,
    info: RwLock<RuntimeInfo>,
}

/// Owns every external server connection and the alias index built from
/// their tool catalogs.
pub struct McpServerManager {
    runtimes: DashMap<String, Arc<ServerRuntime>>,
    index: Arc<ToolIndex>,
}

impl McpServerManager {
    pub fn new() -> Self {
        Self {
            runtimes: DashMap::new(),
            index: Arc::new(ToolIndex::new()),
        }
    }

    pub fn tool_index(&self) -> Arc<ToolIndex> {
        self.index.clone()
    }

    /// Connect every enabled server concurrently. Failures are collected in
    /// the report; they never abort startup.
    pub async fn initialize_from_config(&self, config: &McpConfig) -> StartupReport {
        let (valid, rejected) = config.partition_valid();
        let mut report = StartupReport::default();

        for (name, e) in rejected {
            error!("Skipping MCP server '{}': {}", name, e);
            report.failed.push(FailedServer {
                name,
                reason: e.to_string(),
            });
        }

        let attempts = valid.into_iter().map(|server| async move {
            let name = server.name.clone();
            (name, self.start_server(server).await)
        });

        for (name, outcome) in join_all(attempts).await {
            match outcome {
                Ok(tool_count) => report.connected.push(ConnectedServer { name, tool_count }),
                Err(e) => {
                    error!("Failed to start MCP server '{}': {}", name, e);
                    report.failed.push(FailedServer {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "MCP startup: {} connected, {} failed",
            report.connected.len(),
            report.failed.len()
        );
        report
    }

    /// Start one server from its configuration. Returns the number of tools
    /// it contributed.
    pub async fn start_server(&self, config: McpServerConfig) -> Result<usize> {
        let transport: Arc<dyn McpTransport> = match config.transport()? {
            TransportConfig::Stdio(stdio) => Arc::new(StdioTransport::new(stdio)),
            TransportConfig::Sse(sse) => Arc::new(SseTransport::new(sse)),
        };
        self.start_with_transport(config, transport).await
    }

    /// Connect, handshake and discover tools over an already built transport,
    /// all within the server's connect timeout.
    pub async fn start_with_transport(
        &self,
        config: McpServerConfig,
        transport: Arc<dyn McpTransport>,
    ) -> Result<usize> {
        let server_id = config.name.clone();
        if self.runtimes.contains_key(&server_id) {
            return Err(McpError::AlreadyRunning(server_id));
        }

        info!("Starting MCP server '{}'", server_id);
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let client = McpProtocolClient::new(transport);

        let handshake = async {
            client.connect().await?;
            let init = client.initialize(connect_timeout).await?;
            info!(
                "MCP server '{}' initialized: {} v{}",
                server_id, init.server_info.name, init.server_info.version
            );
            client.list_tools(connect_timeout).await
        };

        let tools = match tokio::time::timeout(connect_timeout, handshake).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                let _ = client.disconnect().await;
                return Err(e);
            }
            Err(_) => {
                let _ = client.disconnect().await;
                return Err(McpError::Timeout(format!(
                    "'{}' did not finish connecting within {}ms",
                    server_id, config.connect_timeout_ms
                )));
            }
        };

        let aliases = self.index.register_server_tools(
            &server_id,
            &tools,
            &config.allowed_tools,
            &config.denied_tools,
        );
        info!(
            "Registered {} of {} MCP tools for server '{}'",
            aliases.len(),
            tools.len(),
            server_id
        );

        let runtime = Arc::new(ServerRuntime {
            config,
            client,
            info: RwLock::new(RuntimeInfo {
                status: ServerStatus::Ready,
                last_error: None,
                connected_at: Some(Utc::now()),
                tool_count: aliases.len(),
            }),
        });
        self.runtimes.insert(server_id, runtime);

        Ok(aliases.len())
    }

    pub async fn stop_server(&self, server_id: &str) -> Result<()> {
        let (_, runtime) = self
            .runtimes
            .remove(server_id)
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?;

        info!("Stopping MCP server '{}'", server_id);
        self.index.remove_server_tools(server_id);

        if let Err(e) = runtime.client.disconnect().await {
            warn!("Error disconnecting MCP server '{}': {}", server_id, e);
        }
        runtime.info.write().await.status = ServerStatus::Stopped;
        Ok(())
    }

    /// Invoke `tool_name` (the server's own name, not the alias) under the
    /// server's request timeout.
    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<McpCallResult> {
        let runtime = self
            .runtimes
            .get(server_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?;

        if !runtime.client.is_connected() {
            return Err(McpError::Disconnected);
        }

        let timeout = Duration::from_millis(runtime.config.request_timeout_ms);
        match runtime.client.call_tool(tool_name, args, timeout).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let mut info = runtime.info.write().await;
                info.last_error = Some(e.to_string());
                if matches!(e, McpError::Disconnected) {
                    info.status = ServerStatus::Error;
                }
                Err(e)
            }
        }
    }

    pub fn list_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runtimes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub async fn server_info(&self, server_id: &str) -> Option<RuntimeInfo> {
        let runtime = self.runtimes.get(server_id).map(|e| e.value().clone())?;
        let info = runtime.info.read().await.clone();
        Some(info)
    }

    pub fn is_server_running(&self, server_id: &str) -> bool {
        self.runtimes.contains_key(server_id)
    }

    /// Stop every server and reap child processes.
    pub async fn shutdown_all(&self) {
        let stops = self.list_servers().into_iter().map(|server_id| async move {
            if let Err(e) = self.stop_server(&server_id).await {
                error!("Error stopping MCP server '{}': {}", server_id, e);
            }
        });
        join_all(stops).await;
    }
}

impl Default for McpServerManager {
    fn default() -> Self {
        Self::new()
    }
}
