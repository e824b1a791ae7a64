//! Fluent command construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::executor::{CommandOutput, ExecError, Invocation};
use crate::mcp::context::ToolContext;

/// Assembles a command line and runs it through the executor bound to a
/// [`ToolContext`].
///
/// ```ignore
/// let output = CommandBuilder::new("helm")
///     .with_args(["list", "-n", "kube-system"])
///     .with_kubeconfig(ctx.kubeconfig())
///     .execute(&ctx)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    command: String,
    args: Vec<String>,
    kubeconfig: Option<PathBuf>,
    timeout: Option<Duration>,
    cache_ttl: Option<Duration>,
}

impl CommandBuilder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            kubeconfig: None,
            timeout: None,
            cache_ttl: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends `flag` when `enabled`.
    pub fn with_flag(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.with_arg(flag)
        } else {
            self
        }
    }

    /// Appends `flag value` when a non-empty value is present.
    pub fn with_flag_value<S: AsRef<str>>(self, flag: &str, value: Option<S>) -> Self {
        match value {
            Some(v) if !v.as_ref().is_empty() => self.with_args([flag, v.as_ref()]),
            _ => self,
        }
    }

    /// Sets `KUBECONFIG` for the child process. Passed through the process
    /// environment, never interpolated into the command line.
    pub fn with_kubeconfig(mut self, kubeconfig: Option<&Path>) -> Self {
        self.kubeconfig = kubeconfig.map(Path::to_path_buf);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reuse output of an identical earlier invocation for up to `ttl`, when
    /// the context carries an output cache.
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new(self.command.clone(), self.args.clone());
        if let Some(path) = &self.kubeconfig {
            invocation
                .env
                .push(("KUBECONFIG".to_string(), path.display().to_string()));
        }
        invocation.timeout = self.timeout;
        invocation
    }

    /// Run with combined output.
    pub async fn execute(&self, ctx: &ToolContext) -> Result<String, ExecError> {
        let invocation = self.invocation();
        let cache = self.cache_ttl.zip(ctx.output_cache());

        if let Some((ttl, cache)) = &cache {
            if let Some(hit) = cache.get(&invocation, *ttl) {
                return Ok(hit);
            }
        }

        let output = ctx
            .shell_executor()
            .exec(&invocation, ctx.cancellation())
            .await?;

        if let Some((_, cache)) = cache {
            cache.put(&invocation, output.clone());
        }
        Ok(output)
    }

    /// Run with stdout and stderr kept apart. Never cached.
    pub async fn execute_with_streams(&self, ctx: &ToolContext) -> Result<CommandOutput, ExecError> {
        ctx.shell_executor()
            .exec_with_streams(&self.invocation(), ctx.cancellation())
            .await
    }
}
