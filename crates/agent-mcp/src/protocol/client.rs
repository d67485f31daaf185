use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;
use crate::types::{McpCallResult, McpTool};

/// Message-oriented transport. `receive` waits for the next message and
/// returns `None` once the peer has gone away.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    async fn receive(&self) -> Result<Option<String>>;
    fn is_connected(&self) -> bool;
}

type PendingMap = Arc<DashMap<u64, oneshot::Sender<JsonRpcResponse>>>;

/// Removes a request's pending entry however its wait ends, including when
/// the caller drops the future.
struct PendingGuard {
    pending: PendingMap,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// JSON-RPC client correlating responses to requests by id.
pub struct McpProtocolClient {
    transport: Arc<dyn McpTransport>,
    next_id: AtomicU64,
    pending: PendingMap,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl McpProtocolClient {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            reader: Mutex::new(None),
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.transport.connect().await?;

        let transport = self.transport.clone();
        let pending = self.pending.clone();
        let handle = tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(Some(message)) => Self::dispatch(&message, &pending).await,
                    Ok(None) => {
                        debug!("MCP transport closed");
                        break;
                    }
                    Err(e) => {
                        warn!("MCP transport error: {}", e);
                        break;
                    }
                }
            }
            // Dropping the senders wakes every waiter with Disconnected.
            pending.clear();
        });

        *self.reader.lock().await = Some(handle);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        self.pending.clear();
        self.transport.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn dispatch(message: &str, pending: &PendingMap) {
        match JsonRpcMessage::parse(message) {
            Ok(JsonRpcMessage::Response(response)) => {
                let Some(id) = response.id.as_u64() else {
                    warn!("Dropping MCP response without numeric id: {}", message);
                    return;
                };
                match pending.remove(&id) {
                    Some((_, waiter)) => {
                        let _ = waiter.send(response);
                    }
                    None => debug!("No pending request for MCP response {}", id),
                }
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!("MCP notification: {}", notification.method);
            }
            Ok(JsonRpcMessage::Request(request)) => {
                debug!("Ignoring server-initiated MCP request: {}", request.method);
            }
            Err(e) => warn!("Unparseable MCP message ({}): {}", e, message),
        }
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };

        self.transport.send(request).await?;

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(McpError::Disconnected),
            Err(_) => {
                return Err(McpError::Timeout(format!(
                    "{} timed out after {}ms",
                    method,
                    timeout.as_millis()
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(McpError::Protocol(format!("{}: {}", error.code, error.message)));
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol(format!("{} returned no result", method)))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.transport.send(notification).await
    }

    /// Run the `initialize` handshake followed by `notifications/initialized`.
    pub async fn initialize(&self, timeout: Duration) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let result = self.send_request("initialize", Some(params), timeout).await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        self.notify("notifications/initialized").await?;
        Ok(result)
    }

    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<McpTool>> {
        let result = self.send_request("tools/list", None, timeout).await?;
        let result: McpToolListResult = serde_json::from_value(result)?;

        Ok(result
            .tools
            .into_iter()
            .map(|tool| McpTool {
                name: tool.name,
                description: tool.description,
                parameters: tool
                    .input_schema
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            })
            .collect())
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<McpCallResult> {
        let params = serde_json::to_value(McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        })?;
        let result = self.send_request("tools/call", Some(params), timeout).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        self.send_request("ping", None, timeout).await.map(|_| ())
    }
}
