use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::stream::StreamTransport;
use crate::config::StdioConfig;
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

type ChildPipes = StreamTransport<ChildStdout, ChildStdin>;

/// Runs the server as a child process and talks to it over its stdio.
pub struct StdioTransport {
    config: StdioConfig,
    child: Mutex<Option<Child>>,
    pipes: Mutex<Option<Arc<ChildPipes>>>,
}

impl StdioTransport {
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            pipes: Mutex::new(None),
        }
    }

    async fn pipes(&self) -> Result<Arc<ChildPipes>> {
        self.pipes.lock().await.clone().ok_or(McpError::Disconnected)
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&self) -> Result<()> {
        info!(
            "Starting MCP server process: {} {:?}",
            self.config.command, self.config.args
        );

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn MCP server process: {}", e);
            McpError::Transport(format!("Failed to spawn '{}': {}", self.config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let command = self.config.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{} stderr] {}", command, line);
                }
            });
        }

        *self.pipes.lock().await = Some(Arc::new(StreamTransport::new(stdout, stdin)));
        *self.child.lock().await = Some(child);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(pipes) = self.pipes.lock().await.take() {
            pipes.disconnect().await?;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => info!("MCP server process exited: {}", status),
                _ => {
                    warn!("MCP server process did not exit after stdin closed, killing");
                    let _ = child.kill().await;
                }
            }
        }

        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        self.pipes().await?.send(message).await
    }

    async fn receive(&self) -> Result<Option<String>> {
        match self.pipes().await {
            Ok(pipes) => pipes.receive().await,
            Err(_) => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.pipes
            .try_lock()
            .map(|pipes| pipes.as_ref().map(|p| p.is_connected()).unwrap_or(false))
            .unwrap_or(true)
    }
}
