//! Logging decorator for shell executors.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::executor::{CommandOutput, ExecError, Invocation, ShellExecutor};

/// Wraps another executor and logs start, outcome and duration of every call.
pub struct LoggingShellExecutor {
    inner: Arc<dyn ShellExecutor>,
}

impl LoggingShellExecutor {
    pub fn new(inner: Arc<dyn ShellExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ShellExecutor for LoggingShellExecutor {
    async fn exec_with_streams(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        let command_line = invocation.display();
        debug!("Executing: {}", command_line);

        let start = Instant::now();
        let result = self.inner.exec_with_streams(invocation, cancel).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => info!("Command succeeded in {:?}: {}", elapsed, command_line),
            Err(e) => match e.captured_output() {
                Some(output) => error!(
                    "Command failed in {:?}: {}: {}\n{}",
                    elapsed, command_line, e, output
                ),
                None => error!("Command failed in {:?}: {}: {}", elapsed, command_line, e),
            },
        }

        result
    }
}
