//! Server bootstrap
//!
//! Builds the registry from the selected providers, starts exactly one
//! transport and waits for either a termination signal or the transport to
//! finish. Shutdown is bounded: a transport that does not stop in time is
//! abandoned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AppConfig, TransportConfig};
use crate::mcp::{McpRegistry, McpServer, RegisteredTool, ToolEnvironment, ToolProvider};
use crate::transport::{HttpTransport, StdioTransport, Transport};

/// How long to wait for the serve and signal tasks after the transport was
/// asked to stop.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Register every selected provider. A provider whose tools cannot be
/// registered is logged and skipped; the others stay available.
pub fn build_registry(providers: &[ToolProvider]) -> McpRegistry {
    let mut registry = McpRegistry::new();
    for provider in providers {
        register_provider(&mut registry, provider.name(), provider.tools());
    }
    info!(
        "Registered {} tools from {} providers",
        registry.tool_count(),
        providers.len()
    );
    registry
}

fn register_provider(registry: &mut McpRegistry, name: &str, tools: Vec<RegisteredTool>) -> bool {
    match registry.register_all(tools) {
        Ok(count) => {
            info!("Registered {} {} tools", count, name);
            true
        }
        Err(e) => {
            error!("Skipping {} tools: {}", name, e);
            false
        }
    }
}

async fn build_transport(config: &AppConfig, server: McpServer) -> Result<Arc<dyn Transport>> {
    match &config.transport {
        TransportConfig::Stdio => Ok(Arc::new(StdioTransport::new(server))),
        TransportConfig::Http(http) => {
            let transport = HttpTransport::bind(http.clone(), server).await?;
            Ok(Arc::new(transport))
        }
    }
}

/// Run the server until SIGINT/SIGTERM or until the transport stops.
pub async fn run(config: AppConfig) -> Result<()> {
    let registry = Arc::new(build_registry(&config.providers));
    let environment = ToolEnvironment::production(config.kubeconfig.clone(), config.argocd.clone())
        .context("Failed to set up tool backends")?;

    let root = CancellationToken::new();
    let server = McpServer::new(registry, environment).with_shutdown_token(root.clone());
    let transport = build_transport(&config, server).await?;

    info!("Starting MCP server with {} transport", transport.name());
    serve(transport, root, config.shutdown_timeout, shutdown_signal()).await
}

/// Drive `transport` until `signal` resolves or it stops on its own, then stop
/// it within `grace`. `root` is cancelled on the way out either way.
pub async fn serve<S>(
    transport: Arc<dyn Transport>,
    root: CancellationToken,
    grace: Duration,
    signal: S,
) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let serve_task = {
        let transport = transport.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let result = transport.start(root.clone()).await;
            if let Err(e) = &result {
                error!("{} transport failed: {:#}", transport.name(), e);
            }
            root.cancel();
            result
        })
    };

    let signal_task = {
        let root = root.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal => {
                    info!("Received shutdown signal, initiating graceful shutdown");
                    root.cancel();
                }
                _ = root.cancelled() => {}
            }
        })
    };

    root.cancelled().await;

    if let Err(e) = transport.stop(grace).await {
        warn!("{}, exiting anyway", e);
    }

    let joined = tokio::time::timeout(TASK_JOIN_TIMEOUT, async {
        (serve_task.await, signal_task.await)
    })
    .await;

    match joined {
        Ok((serve, _signal)) => serve.context("Transport task panicked")?,
        Err(_) => {
            warn!("Server tasks did not finish within {:?}", TASK_JOIN_TIMEOUT);
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
