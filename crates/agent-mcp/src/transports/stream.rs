use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// Newline-delimited JSON framing over any async byte pipe.
pub struct StreamTransport<R, W> {
    reader: Mutex<Option<Lines<BufReader<R>>>>,
    writer: Mutex<Option<W>>,
    connected: AtomicBool,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(Some(BufReader::new(reader).lines())),
            writer: Mutex::new(Some(writer)),
            connected: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl<R, W> McpTransport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(McpError::Disconnected)
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the writer closes the pipe, which signals EOF to the peer.
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.reader.lock().await.take();
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::Disconnected)?;

        writer
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("Failed to write: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to flush: {}", e)))?;

        debug!("Sent: {}", message);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let mut guard = self.reader.lock().await;
        let Some(lines) = guard.as_mut() else {
            return Ok(None);
        };

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    return Ok(Some(line.to_string()));
                }
                Ok(None) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(McpError::Transport(format!("Failed to read: {}", e)));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_messages_by_line() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);

        let client = StreamTransport::new(client_read, client_write);
        let server = StreamTransport::new(server_read, server_write);

        client.send(r#"{"a":1}"#.to_string()).await.unwrap();
        client.send(r#"{"b":2}"#.to_string()).await.unwrap();

        assert_eq!(server.receive().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(server.receive().await.unwrap().as_deref(), Some(r#"{"b":2}"#));
    }

    #[tokio::test]
    async fn peer_disconnect_reads_as_closed() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);

        let client = StreamTransport::new(client_read, client_write);
        let server = StreamTransport::new(server_read, server_write);

        client.disconnect().await.unwrap();
        drop(client);

        assert_eq!(server.receive().await.unwrap(), None);
        assert!(!server.is_connected());
    }
}
