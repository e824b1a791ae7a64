//! Backends and servers shared by the end-to-end tests.

use async_trait::async_trait;
use cluster_tools_server::exec::MockShellExecutor;
use cluster_tools_server::rest::{RestClient, RestError, RestRequest};
use cluster_tools_server::server::build_registry;
use cluster_tools_server::{McpServer, ToolEnvironment, ToolProvider};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Answers every request with the same body and remembers the URLs it saw.
pub struct FakeRestClient {
    response: Result<Value, String>,
    urls: Mutex<Vec<String>>,
}

impl FakeRestClient {
    pub fn returning(body: Value) -> Self {
        Self {
            response: Ok(body),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestClient for FakeRestClient {
    async fn get_json(&self, request: RestRequest) -> Result<Value, RestError> {
        self.urls.lock().unwrap().push(request.url.clone());
        match &self.response {
            Ok(body) => Ok(body.clone()),
            Err(message) => Err(RestError::Transport {
                url: request.url,
                message: message.clone(),
            }),
        }
    }
}

/// Every provider registered, subprocesses answered by `executor`.
pub fn all_tools_server(executor: Arc<MockShellExecutor>) -> McpServer {
    let registry = build_registry(&ToolProvider::ALL);
    let environment = ToolEnvironment::with_backends(
        executor,
        Arc::new(FakeRestClient::failing("no REST backend in tests")),
    );
    McpServer::new(Arc::new(registry), environment)
}

/// A JSON-RPC 2.0 request envelope.
pub fn rpc_request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}
