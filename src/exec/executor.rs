//! Shell command execution.
//!
//! Every external CLI call made by a tool goes through a [`ShellExecutor`].
//! The real implementation spawns one OS process per call and ties the
//! child's lifetime to the caller's cancellation token; tests swap in
//! [`super::MockShellExecutor`] through the tool context.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {}", exit_label(*.code), .output.trim())]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("`{command}` timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("{message}")]
    Failed { command: String, message: String },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

impl ExecError {
    /// A failure that carries only a message, used by executors that do not
    /// spawn real processes.
    pub fn failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        ExecError::Failed {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            ExecError::Spawn { command, .. }
            | ExecError::NonZeroExit { command, .. }
            | ExecError::Timeout { command, .. }
            | ExecError::Cancelled { command }
            | ExecError::Failed { command, .. } => command,
        }
    }

    /// Output captured before the failure, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            ExecError::NonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// A fully described command invocation.
///
/// Arguments are kept as an argv vector and handed to the OS as-is; nothing is
/// ever joined into a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: Vec::new(),
            timeout: None,
        }
    }

    /// `command arg1 arg2 ...`, for logs and error messages only.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }
}

/// Capability to run an external process and capture what it printed.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run the command and capture stdout and stderr separately.
    async fn exec_with_streams(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;

    /// Run the command and return its combined output.
    async fn exec(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<String, ExecError> {
        self.exec_with_streams(invocation, cancel)
            .await
            .map(|output| output.combined())
    }
}

/// Executor that spawns real processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealShellExecutor;

#[async_trait]
impl ShellExecutor for RealShellExecutor {
    async fn exec_with_streams(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        let command_line = invocation.display();

        // stdin may be the MCP stdio channel, children must never read from it.
        // kill_on_drop makes dropping the wait future below terminate the child.
        let child = Command::new(&invocation.command)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let deadline = async {
            match invocation.timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        let output = tokio::select! {
            output = wait => output.map_err(|source| ExecError::Spawn {
                command: command_line.clone(),
                source,
            })?,
            _ = cancel.cancelled() => {
                return Err(ExecError::Cancelled { command: command_line });
            }
            _ = deadline => {
                return Err(ExecError::Timeout {
                    command: command_line,
                    after: invocation.timeout.unwrap_or_default(),
                });
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(ExecError::NonZeroExit {
                command: command_line,
                code: output.status.code(),
                output: captured.combined(),
            });
        }

        Ok(captured)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn invocation(command: &str, args: &[&str]) -> Invocation {
        Invocation::new(command, args.iter().map(|a| a.to_string()).collect())
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = RealShellExecutor
            .exec(&invocation("echo", &["hello"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_streams_are_kept_apart() {
        let output = RealShellExecutor
            .exec_with_streams(
                &invocation("sh", &["-c", "echo out; echo err >&2"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_output() {
        let err = RealShellExecutor
            .exec(
                &invocation("sh", &["-c", "echo broken >&2; exit 3"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match &err {
            ExecError::NonZeroExit { code, output, .. } => {
                assert_eq!(*code, Some(3));
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let err = RealShellExecutor
            .exec(
                &invocation("definitely-not-a-real-binary-4242", &[]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_env_is_passed_without_interpolation() {
        let mut inv = invocation("sh", &["-c", "printf %s \"$KUBECONFIG\""]);
        inv.env.push(("KUBECONFIG".into(), "/tmp/$(whoami)".into()));
        let output = RealShellExecutor
            .exec(&inv, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, "/tmp/$(whoami)");
    }

    #[tokio::test]
    async fn test_timeout_kills_long_running_command() {
        let mut inv = invocation("sleep", &["5"]);
        inv.timeout = Some(Duration::from_millis(100));
        let start = Instant::now();
        let err = RealShellExecutor
            .exec(&inv, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_terminates_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("sleep 1; touch {}", marker.display());
        let inv = invocation("sh", &["-c", &script]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = RealShellExecutor.exec(&inv, &cancel).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled { .. }));

        // A child that survived cancellation would create the marker.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }
}
