//! MCP Tool Execution Context
//!
//! Every tool call receives its own [`ToolContext`]. The context carries the
//! side-effecting backends (shell executor, REST client) so handlers never
//! pick an implementation themselves, plus the cancellation token for the
//! call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::exec::{CommandBuilder, LoggingShellExecutor, OutputCache, RealShellExecutor, ShellExecutor};
use crate::rest::{HttpRestClient, RestClient};

/// Binaries that honour `KUBECONFIG`.
const KUBE_AWARE_BINARIES: &[&str] = &["kubectl", "helm", "istioctl", "cilium"];

/// ArgoCD API location and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgoCdEndpoint {
    pub url: String,
    pub token: Option<String>,
}

/// Context provided to tool handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    shell_executor: Option<Arc<dyn ShellExecutor>>,
    rest_client: Option<Arc<dyn RestClient>>,
    kubeconfig: Option<PathBuf>,
    argocd: Option<ArgoCdEndpoint>,
    output_cache: Option<Arc<OutputCache>>,
    cancellation: CancellationToken,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolContext {
    /// A context with no overrides: the real executor, a fresh REST client
    /// and a token that is never cancelled.
    pub fn new() -> Self {
        Self {
            shell_executor: None,
            rest_client: None,
            kubeconfig: None,
            argocd: None,
            output_cache: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_shell_executor(mut self, executor: Arc<dyn ShellExecutor>) -> Self {
        self.shell_executor = Some(executor);
        self
    }

    pub fn with_rest_client(mut self, client: Arc<dyn RestClient>) -> Self {
        self.rest_client = Some(client);
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn with_argocd(mut self, argocd: Option<ArgoCdEndpoint>) -> Self {
        self.argocd = argocd;
        self
    }

    pub fn with_output_cache(mut self, cache: Arc<OutputCache>) -> Self {
        self.output_cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The executor bound to this call, falling back to the real one.
    pub fn shell_executor(&self) -> Arc<dyn ShellExecutor> {
        match &self.shell_executor {
            Some(executor) => executor.clone(),
            None => Arc::new(LoggingShellExecutor::new(Arc::new(RealShellExecutor))),
        }
    }

    /// The REST client bound to this call. Without an override a client is
    /// built on demand; `None` only if that fails.
    pub fn rest_client(&self) -> Option<Arc<dyn RestClient>> {
        match &self.rest_client {
            Some(client) => Some(client.clone()),
            None => HttpRestClient::new(DEFAULT_REST_TIMEOUT_SECS)
                .ok()
                .map(|c| Arc::new(c) as Arc<dyn RestClient>),
        }
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    pub fn argocd(&self) -> Option<&ArgoCdEndpoint> {
        self.argocd.as_ref()
    }

    pub fn output_cache(&self) -> Option<Arc<OutputCache>> {
        self.output_cache.clone()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Start a command line for `binary`, carrying the kubeconfig for binaries
    /// that talk to the cluster.
    pub fn command(&self, binary: &str) -> CommandBuilder {
        let builder = CommandBuilder::new(binary);
        if KUBE_AWARE_BINARIES.contains(&binary) {
            builder.with_kubeconfig(self.kubeconfig())
        } else {
            builder
        }
    }
}

const DEFAULT_REST_TIMEOUT_SECS: u64 = 30;

/// Process-wide backends from which a [`ToolContext`] is minted per call.
#[derive(Clone)]
pub struct ToolEnvironment {
    pub shell_executor: Arc<dyn ShellExecutor>,
    pub rest_client: Arc<dyn RestClient>,
    pub kubeconfig: Option<PathBuf>,
    pub argocd: Option<ArgoCdEndpoint>,
    pub output_cache: Option<Arc<OutputCache>>,
}

impl ToolEnvironment {
    /// Real backends: logged process execution and a `reqwest` client.
    pub fn production(
        kubeconfig: Option<PathBuf>,
        argocd: Option<ArgoCdEndpoint>,
    ) -> anyhow::Result<Self> {
        let rest_client = HttpRestClient::new(DEFAULT_REST_TIMEOUT_SECS)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(Self {
            shell_executor: Arc::new(LoggingShellExecutor::new(Arc::new(RealShellExecutor))),
            rest_client: Arc::new(rest_client),
            kubeconfig,
            argocd,
            output_cache: None,
        })
    }

    /// Test backends, with nothing else configured.
    pub fn with_backends(
        shell_executor: Arc<dyn ShellExecutor>,
        rest_client: Arc<dyn RestClient>,
    ) -> Self {
        Self {
            shell_executor,
            rest_client,
            kubeconfig: None,
            argocd: None,
            output_cache: None,
        }
    }

    /// A context for one call, cancelled together with `cancellation`.
    pub fn context(&self, cancellation: CancellationToken) -> ToolContext {
        let mut ctx = ToolContext::new()
            .with_shell_executor(self.shell_executor.clone())
            .with_rest_client(self.rest_client.clone())
            .with_kubeconfig(self.kubeconfig.clone())
            .with_argocd(self.argocd.clone())
            .with_cancellation(cancellation);
        if let Some(cache) = &self.output_cache {
            ctx = ctx.with_output_cache(cache.clone());
        }
        ctx
    }
}
