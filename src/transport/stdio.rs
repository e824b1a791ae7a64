//! Stdio transport
//!
//! One JSON-RPC message per line on stdin, one response per line on stdout.
//! Nothing else may be written to stdout while this transport runs.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Lifecycle, Transport, TransportError};
use crate::mcp::{McpServer, SessionState};

const NAME: &str = "stdio";

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct StdioTransport {
    server: McpServer,
    streams: Mutex<Option<(Reader, Writer)>>,
    lifecycle: Lifecycle,
}

impl StdioTransport {
    /// Serve over the process's stdin and stdout.
    pub fn new(server: McpServer) -> Self {
        Self::with_streams(
            server,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// Serve over arbitrary streams.
    pub fn with_streams<R, W>(server: McpServer, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            server,
            streams: Mutex::new(Some((Box::new(reader), Box::new(writer)))),
            lifecycle: Lifecycle::new(NAME),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let _serving = self.lifecycle.begin()?;
        let (reader, mut writer) = self
            .streams
            .lock()
            .await
            .take()
            .context("stdio streams already consumed")?;

        info!("MCP stdio transport ready");

        let stop = self.lifecycle.cancellation().clone();
        let mut lines = reader.lines();
        let mut session = SessionState::gated();

        loop {
            let line = tokio::select! {
                _ = stop.cancelled() => break,
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line.context("Failed to read from stdin")?,
            };

            let Some(line) = line else {
                info!("stdin closed, stopping stdio transport");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let response = tokio::select! {
                _ = stop.cancelled() => break,
                _ = shutdown.cancelled() => break,
                response = self.server.handle_text(&line, &mut session) => response,
            };

            let Some(response) = response else {
                continue;
            };
            let mut payload = match serde_json::to_vec(&response) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize MCP response: {}", e);
                    continue;
                }
            };
            payload.push(b'\n');
            writer
                .write_all(&payload)
                .await
                .context("Failed to write to stdout")?;
            writer.flush().await.context("Failed to flush stdout")?;
        }

        debug!("stdio serve loop finished");
        Ok(())
    }

    async fn stop(&self, grace: Duration) -> Result<(), TransportError> {
        self.lifecycle.stop(grace).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
