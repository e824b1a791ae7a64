//! MCP transports
//!
//! A transport moves JSON-RPC messages between a client and the shared
//! [`McpServer`](crate::mcp::McpServer). Exactly one transport runs per
//! process:
//!
//! - [`StdioTransport`]: newline-delimited JSON over stdin/stdout
//! - [`HttpTransport`]: JSON-RPC over HTTP POST
//!
//! Each instance moves through `Created -> Started -> Stopped` once.

pub mod http;
pub mod http_logging;
pub mod stdio;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use http::{HttpTransport, HttpTransportConfig};
pub use http_logging::RequestsLoggingLevel;
pub use stdio::StdioTransport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{0} transport already started")]
    AlreadyStarted(&'static str),

    #[error("{0} transport was stopped")]
    Stopped(&'static str),

    #[error("{name} transport did not stop within {grace:?}")]
    StopTimedOut { name: &'static str, grace: Duration },
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Serve until `shutdown` is cancelled, [`Transport::stop`] is called, or
    /// the underlying channel closes.
    async fn start(&self, shutdown: CancellationToken) -> anyhow::Result<()>;

    /// Ask the serve loop to finish and wait at most `grace` for it. Calling
    /// it again, or before `start`, is harmless.
    async fn stop(&self, grace: Duration) -> Result<(), TransportError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Created,
    Started,
    Stopped,
}

/// State machine shared by the transports.
pub(crate) struct Lifecycle {
    name: &'static str,
    state: Mutex<TransportState>,
    cancel: CancellationToken,
    stopped: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            name,
            state: Mutex::new(TransportState::Created),
            cancel: CancellationToken::new(),
            stopped,
        }
    }

    pub(crate) fn state(&self) -> TransportState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Created -> Started`. The returned guard marks the transport stopped
    /// when the serve loop ends, however it ends.
    pub(crate) fn begin(&self) -> Result<ServeGuard<'_>, TransportError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            TransportState::Created => {
                *state = TransportState::Started;
                debug!("{} transport started", self.name);
                Ok(ServeGuard { lifecycle: self })
            }
            TransportState::Started => Err(TransportError::AlreadyStarted(self.name)),
            TransportState::Stopped => Err(TransportError::Stopped(self.name)),
        }
    }

    /// Cancelled by [`Lifecycle::stop`].
    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) async fn stop(&self, grace: Duration) -> Result<(), TransportError> {
        self.cancel.cancel();

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                TransportState::Created => {
                    *state = TransportState::Stopped;
                    return Ok(());
                }
                TransportState::Stopped => return Ok(()),
                TransportState::Started => {}
            }
        }

        let mut stopped = self.stopped.subscribe();
        let finished = tokio::time::timeout(grace, stopped.wait_for(|done| *done))
            .await
            .is_ok();
        if finished {
            Ok(())
        } else {
            Err(TransportError::StopTimedOut {
                name: self.name,
                grace,
            })
        }
    }

    fn finish(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = TransportState::Stopped;
        self.stopped.send_replace(true);
        debug!("{} transport stopped", self.name);
    }
}

pub(crate) struct ServeGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for ServeGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.finish();
    }
}
