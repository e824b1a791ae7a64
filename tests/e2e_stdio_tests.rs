//! End-to-end tests for the stdio transport
//!
//! The transport runs over in-memory pipes standing in for stdin/stdout.

mod common;

use cluster_tools_server::exec::MockShellExecutor;
use cluster_tools_server::{McpServer, StdioTransport, Transport};
use common::{all_tools_server, rpc_request, TestClient, TestServer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Client side of a running stdio transport.
struct StdioSession {
    stdin: Option<DuplexStream>,
    stdout: Lines<BufReader<DuplexStream>>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl StdioSession {
    fn start(server: McpServer) -> Self {
        let (stdin, server_in) = duplex(64 * 1024);
        let (server_out, stdout) = duplex(64 * 1024);
        let transport = StdioTransport::with_streams(server, BufReader::new(server_in), server_out);
        let task = tokio::spawn(async move { transport.start(CancellationToken::new()).await });
        Self {
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            task,
        }
    }

    async fn send(&mut self, message: &Value) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        let mut line = serde_json::to_vec(message).unwrap();
        line.push(b'\n');
        stdin.write_all(&line).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(line.as_bytes()).await.unwrap();
        stdin.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.stdout.next_line())
            .await
            .expect("Timed out waiting for a response")
            .unwrap()
            .expect("stdout closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, message: Value) -> Value {
        self.send(&message).await;
        self.recv().await
    }

    async fn close(mut self) -> anyhow::Result<()> {
        drop(self.stdin.take());
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("Transport did not finish after EOF")
            .unwrap()
    }
}

fn initialize_request(id: u64) -> Value {
    rpc_request(
        id,
        "initialize",
        json!({"protocolVersion": "2024-11-05", "capabilities": {}}),
    )
}

#[tokio::test]
async fn test_session_is_gated_until_initialize() {
    let mut session = StdioSession::start(all_tools_server(Arc::new(MockShellExecutor::new())));

    let early = session.request(rpc_request(1, "tools/list", json!({}))).await;
    assert_eq!(early["id"], 1);
    assert_eq!(early["error"]["code"], -32002);

    let init = session.request(initialize_request(2)).await;
    assert_eq!(init["id"], 2);
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

    // No response for the notification; the next line answers the ping.
    session
        .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    let pong = session.request(rpc_request(3, "ping", json!({}))).await;
    assert_eq!(pong["id"], 3);

    let list = session.request(rpc_request(4, "tools/list", json!({}))).await;
    assert!(!list["result"]["tools"].as_array().unwrap().is_empty());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_line_does_not_end_session() {
    let mut session = StdioSession::start(all_tools_server(Arc::new(MockShellExecutor::new())));

    session.send_raw("{invalid json}").await;
    let error = session.recv().await;
    assert_eq!(error["jsonrpc"], "2.0");
    assert_eq!(error["error"]["code"], -32700);
    assert!(error["id"].is_null());

    let init = session.request(initialize_request(1)).await;
    assert!(init["result"].is_object());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_required_parameter_over_stdio() {
    let executor = Arc::new(MockShellExecutor::new());
    let mut session = StdioSession::start(all_tools_server(executor.clone()));
    session.request(initialize_request(1)).await;

    let response = session
        .request(rpc_request(
            2,
            "tools/call",
            json!({"name": "cilium_connect_to_remote_cluster", "arguments": {}}),
        ))
        .await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        response["result"]["content"][0]["text"],
        "cluster_name parameter is required"
    );
    assert!(executor.call_log().is_empty());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_http_and_stdio_results_match() {
    let executor = Arc::new(MockShellExecutor::new());
    executor.add_command_string(
        "cilium",
        &["clustermesh", "connect", "--destination-cluster", "my-cluster"],
        "Connected to my-cluster",
        None,
    );
    executor.add_partial_match_string("helm", &["get"], "", Some("release: not found"));

    let http_server = TestServer::spawn_with_executor(executor.clone()).await;
    let client = TestClient::new(http_server.base_url.clone());
    let mut session = StdioSession::start(all_tools_server(executor.clone()));
    session.request(initialize_request(0)).await;

    let calls = [
        ("cilium_connect_to_remote_cluster", json!({"cluster_name": "my-cluster"})),
        ("helm_get_release", json!({"name": "web", "namespace": "prod"})),
        ("helm_get_release", json!({"name": "web"})),
    ];

    for (i, (name, arguments)) in calls.iter().enumerate() {
        let id = i as u64 + 1;
        let over_http: Value = client
            .call_tool(id, name, arguments.clone())
            .await
            .json()
            .await
            .unwrap();
        let over_stdio = session
            .request(rpc_request(
                id,
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            ))
            .await;

        assert_eq!(over_http["id"], over_stdio["id"]);
        assert_eq!(over_http["result"], over_stdio["result"], "{}", name);
    }

    session.close().await.unwrap();
}
