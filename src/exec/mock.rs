//! Deterministic executor for tests.
//!
//! Responses are registered per (command, args). An exact match wins over a
//! partial match; partial matches compare the registered args as a prefix of
//! the actual args and are tried in registration order. Every call is recorded,
//! matched or not.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::executor::{CommandOutput, ExecError, Invocation, ShellExecutor};

#[derive(Debug, Clone)]
struct CannedResponse {
    output: String,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct PartialMatch {
    command: String,
    args_prefix: Vec<String>,
    response: CannedResponse,
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCall {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Zero-based position in the call log.
    pub order: usize,
}

#[derive(Default)]
pub struct MockShellExecutor {
    exact: Mutex<HashMap<(String, Vec<String>), CannedResponse>>,
    partial: Mutex<Vec<PartialMatch>>,
    calls: Mutex<Vec<CommandCall>>,
}

fn to_owned_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl MockShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to exactly `command args...` with `output`, or fail with `error`.
    pub fn add_command_string(
        &self,
        command: &str,
        args: &[&str],
        output: &str,
        error: Option<&str>,
    ) {
        self.exact.lock().unwrap().insert(
            (command.to_string(), to_owned_args(args)),
            CannedResponse {
                output: output.to_string(),
                error: error.map(str::to_string),
            },
        );
    }

    /// Respond to any call of `command` whose args start with `args_prefix`.
    pub fn add_partial_match_string(
        &self,
        command: &str,
        args_prefix: &[&str],
        output: &str,
        error: Option<&str>,
    ) {
        self.partial.lock().unwrap().push(PartialMatch {
            command: command.to_string(),
            args_prefix: to_owned_args(args_prefix),
            response: CannedResponse {
                output: output.to_string(),
                error: error.map(str::to_string),
            },
        });
    }

    pub fn call_log(&self) -> Vec<CommandCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Args of every recorded call to `command`, in call order.
    pub fn calls_to(&self, command: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command == command)
            .map(|c| c.args.clone())
            .collect()
    }

    pub fn clear_call_log(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, invocation: &Invocation) {
        let mut calls = self.calls.lock().unwrap();
        let order = calls.len();
        calls.push(CommandCall {
            command: invocation.command.clone(),
            args: invocation.args.clone(),
            env: invocation.env.clone(),
            timeout: invocation.timeout,
            order,
        });
    }

    fn lookup(&self, invocation: &Invocation) -> Option<CannedResponse> {
        let key = (invocation.command.clone(), invocation.args.clone());
        if let Some(response) = self.exact.lock().unwrap().get(&key) {
            return Some(response.clone());
        }
        self.partial
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.command == invocation.command && invocation.args.starts_with(&m.args_prefix)
            })
            .map(|m| m.response.clone())
    }
}

#[async_trait]
impl ShellExecutor for MockShellExecutor {
    async fn exec_with_streams(
        &self,
        invocation: &Invocation,
        _cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        self.record(invocation);

        match self.lookup(invocation) {
            Some(CannedResponse {
                error: Some(message),
                ..
            }) => Err(ExecError::failed(invocation.display(), message)),
            Some(CannedResponse { output, .. }) => Ok(CommandOutput {
                stdout: output,
                stderr: String::new(),
            }),
            None => Err(ExecError::failed(
                invocation.display(),
                format!("no mock response registered for: {}", invocation.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(command: &str, args: &[&str]) -> Invocation {
        Invocation::new(command, to_owned_args(args))
    }

    #[tokio::test]
    async fn test_exact_match_wins_over_partial() {
        let mock = MockShellExecutor::new();
        mock.add_partial_match_string("kubectl", &["get"], "partial", None);
        mock.add_command_string("kubectl", &["get", "pods"], "exact", None);

        let cancel = CancellationToken::new();
        let out = mock.exec(&inv("kubectl", &["get", "pods"]), &cancel).await;
        assert_eq!(out.unwrap(), "exact");

        let out = mock.exec(&inv("kubectl", &["get", "nodes"]), &cancel).await;
        assert_eq!(out.unwrap(), "partial");
    }

    #[tokio::test]
    async fn test_partial_match_requires_prefix() {
        let mock = MockShellExecutor::new();
        mock.add_partial_match_string("kubectl", &["get", "pods"], "pods", None);

        let err = mock
            .exec(&inv("kubectl", &["describe", "pods"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no mock response"));
    }

    #[tokio::test]
    async fn test_canned_error() {
        let mock = MockShellExecutor::new();
        mock.add_command_string("helm", &["list"], "", Some("cluster unreachable"));

        let err = mock
            .exec(&inv("helm", &["list"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cluster unreachable");
    }

    #[tokio::test]
    async fn test_call_log_records_order_and_unmatched_calls() {
        let mock = MockShellExecutor::new();
        mock.add_command_string("cilium", &["status"], "ok", None);

        let cancel = CancellationToken::new();
        let _ = mock.exec(&inv("cilium", &["status"]), &cancel).await;
        let _ = mock.exec(&inv("cilium", &["version"]), &cancel).await;

        let log = mock.call_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].args, vec!["status"]);
        assert_eq!(log[1].order, 1);
        assert_eq!(mock.calls_to("cilium").len(), 2);

        mock.clear_call_log();
        assert!(mock.call_log().is_empty());
    }
}
