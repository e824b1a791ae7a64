//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per MCP endpoint. When routes or request
//! formats change, update only this file.

use super::constants::*;
use super::fixtures::rpc_request;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }

    /// POST a raw body, for malformed payloads.
    pub async fn post_raw(&self, path: &str, body: &str) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn initialize(&self, id: u64) -> Response {
        self.post_json(
            "/mcp/initialize",
            &rpc_request(
                id,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "e2e", "version": "1.0"}
                }),
            ),
        )
        .await
    }

    pub async fn list_tools(&self, id: u64) -> Response {
        self.post_json("/mcp/tools/list", &rpc_request(id, "tools/list", json!({})))
            .await
    }

    pub async fn call_tool(&self, id: u64, name: &str, arguments: Value) -> Response {
        self.post_json(
            "/mcp/tools/call",
            &rpc_request(id, "tools/call", json!({"name": name, "arguments": arguments})),
        )
        .await
    }
}
