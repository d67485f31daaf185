use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SseConfig;
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// Server-to-client messages arrive on a long-lived SSE stream. Client-to-server
/// messages are POSTed to the endpoint the server announces in its first
/// `endpoint` event.
pub struct SseTransport {
    config: SseConfig,
    client: Client,
    connected: AtomicBool,
    endpoint: Mutex<Option<Url>>,
    inbox: Mutex<Option<mpsc::Receiver<String>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    pub fn new(config: SseConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            connected: AtomicBool::new(false),
            endpoint: Mutex::new(None),
            inbox: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// The announced endpoint may be absolute or relative to the stream URL.
    fn resolve_endpoint(base: &Url, announced: &str) -> Result<Url> {
        base.join(announced.trim())
            .map_err(|e| McpError::Protocol(format!("Invalid endpoint '{}': {}", announced, e)))
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn connect(&self) -> Result<()> {
        info!("Connecting to MCP SSE endpoint: {}", self.config.url);

        let base = Url::parse(&self.config.url)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid url: {}", e)))?;
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let response = tokio::time::timeout(
            connect_timeout,
            self.client
                .get(base.clone())
                .headers(self.build_headers()?)
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::Timeout(format!("Connecting to {} timed out", self.config.url)))??;

        if !response.status().is_success() {
            return Err(McpError::Connection(format!("HTTP error: {}", response.status())));
        }

        let (message_tx, message_rx) = mpsc::channel(100);
        let (endpoint_tx, mut endpoint_rx) = watch::channel(None::<String>);
        let url = self.config.url.clone();

        let handle = tokio::spawn(async move {
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => {
                        debug!("SSE endpoint announced: {}", event.data);
                        let _ = endpoint_tx.send(Some(event.data));
                    }
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if message_tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => debug!("Ignoring SSE event '{}'", event.event),
                    Err(e) => {
                        warn!("SSE stream error: {}", e);
                        break;
                    }
                }
            }
            debug!("SSE stream ended for {}", url);
        });

        let announced = tokio::time::timeout(
            connect_timeout,
            endpoint_rx.wait_for(|endpoint| endpoint.is_some()),
        )
        .await
        .map(|waited| waited.map(|endpoint| endpoint.clone()));

        let announced = match announced {
            Ok(Ok(endpoint)) => endpoint.unwrap_or_default(),
            Ok(Err(_)) => {
                handle.abort();
                return Err(McpError::Protocol(
                    "SSE stream closed before announcing an endpoint".to_string(),
                ));
            }
            Err(_) => {
                handle.abort();
                return Err(McpError::Timeout(
                    "No endpoint event received from SSE server".to_string(),
                ));
            }
        };

        *self.endpoint.lock().await = Some(Self::resolve_endpoint(&base, &announced)?);
        *self.inbox.lock().await = Some(message_rx);
        *self.reader.lock().await = Some(handle);
        self.connected.store(true, Ordering::SeqCst);

        info!("MCP SSE transport connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        self.inbox.lock().await.take();
        self.endpoint.lock().await.take();
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let endpoint = self
            .endpoint
            .lock()
            .await
            .clone()
            .ok_or(McpError::Disconnected)?;

        let response = self
            .client
            .post(endpoint.clone())
            .headers(self.build_headers()?)
            .header(CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!("POST failed: {} - {}", status, body)));
        }

        debug!("Sent message via POST to {}", endpoint);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut inbox = self.inbox.lock().await;
        let Some(rx) = inbox.as_mut() else {
            return Ok(None);
        };

        let message = rx.recv().await;
        if message.is_none() {
            self.connected.store(false, Ordering::SeqCst);
        }
        Ok(message)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> SseConfig {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        SseConfig {
            url,
            headers,
            connect_timeout_ms: 2_000,
        }
    }

    #[test]
    fn relative_endpoint_resolves_against_stream_url() {
        let base = Url::parse("http://localhost:9000/mcp/sse").unwrap();
        let endpoint = SseTransport::resolve_endpoint(&base, "/messages?session=1").unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:9000/messages?session=1");
    }

    #[tokio::test]
    async fn reads_endpoint_and_messages_then_posts_to_endpoint() {
        let server = MockServer::start().await;
        let body = "event: endpoint\ndata: /messages?session=abc\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";

        Mock::given(method("GET"))
            .and(path("/sse"))
            .and(header("x-api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_string_contains("tools/list"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let transport = SseTransport::new(config(format!("{}/sse", server.uri())));
        transport.connect().await.unwrap();

        let message = transport.receive().await.unwrap().unwrap();
        assert!(message.contains("\"id\":1"));

        transport
            .send(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#.to_string())
            .await
            .unwrap();

        // Stream body is finite, so the inbox drains to closed.
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn stream_without_endpoint_fails_to_connect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: message\ndata: {}\n\n"),
            )
            .mount(&server)
            .await;

        let transport = SseTransport::new(config(format!("{}/sse", server.uri())));
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn connects_from_a_spawned_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: endpoint\ndata: /messages\n\n"),
            )
            .mount(&server)
            .await;

        let transport = Arc::new(SseTransport::new(config(format!("{}/sse", server.uri()))));
        let connecting = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.connect().await })
        };

        connecting.await.unwrap().unwrap();
        assert!(transport.is_connected());
    }
}
