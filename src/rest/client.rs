//! HTTP client for JSON REST backends (Prometheus, ArgoCD).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by a REST backend call.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// A GET request against a JSON API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer_token: Option<String>,
}

impl RestRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Adds the pair only when a non-empty value is present.
    pub fn query_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.query(key, v),
            _ => self,
        }
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }
}

/// Capability to call a JSON REST API.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn get_json(&self, request: RestRequest) -> Result<Value, RestError>;
}

/// `reqwest` backed client.
pub struct HttpRestClient {
    client: reqwest::Client,
}

impl HttpRestClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(timeout_sec: u64) -> Result<Self, RestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| RestError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn get_json(&self, request: RestRequest) -> Result<Value, RestError> {
        let url = request.url.trim_end_matches('/').to_string();

        let mut builder = self.client.get(&url).query(&request.query);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| RestError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| RestError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_opt_skips_empty_values() {
        let request = RestRequest::get("http://prometheus:9090/api/v1/query")
            .query("query", "up")
            .query_opt("time", None)
            .query_opt("timeout", Some(""));
        assert_eq!(request.query, vec![("query".to_string(), "up".to_string())]);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = HttpRestClient::new(1).unwrap();
        let err = client
            .get_json(RestRequest::get("http://127.0.0.1:1/api/v1/query"))
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Transport { .. }));
    }
}
