//! Test server lifecycle management
//!
//! Each test gets its own HTTP transport on a random port, backed by a mock
//! executor the test controls.

use super::constants::*;
use super::fixtures::all_tools_server;
use cluster_tools_server::exec::MockShellExecutor;
use cluster_tools_server::transport::{HttpTransportConfig, RequestsLoggingLevel};
use cluster_tools_server::{HttpTransport, McpServer, Transport};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// When dropped, the server shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The executor every tool call goes through
    pub executor: Arc<MockShellExecutor>,

    transport: Arc<HttpTransport>,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a server with every provider and an empty mock executor.
    pub async fn spawn() -> Self {
        Self::spawn_with_executor(Arc::new(MockShellExecutor::new())).await
    }

    pub async fn spawn_with_executor(executor: Arc<MockShellExecutor>) -> Self {
        let server = all_tools_server(executor.clone());
        Self::spawn_server(server, executor).await
    }

    async fn spawn_server(server: McpServer, executor: Arc<MockShellExecutor>) -> Self {
        let config = HttpTransportConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let transport = Arc::new(
            HttpTransport::bind(config, server)
                .await
                .expect("Failed to bind HTTP transport"),
        );
        let base_url = format!("http://{}", transport.local_addr());

        let shutdown = CancellationToken::new();
        let serving = transport.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            serving.start(token).await.expect("Server failed");
        });

        let server = Self {
            base_url,
            executor,
            transport,
            shutdown,
        };
        server.wait_for_ready().await;
        server
    }

    /// Stop the transport the way the bootstrap does.
    pub async fn stop(&self, grace: Duration) {
        self.transport
            .stop(grace)
            .await
            .expect("Transport did not stop in time");
    }

    /// Waits for the server to become ready by polling `/health`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
