//! HTTP transport
//!
//! JSON-RPC over `POST`. Every request is handled on its own; there is no
//! session, so tools are usable without a prior `initialize`.
//!
//! | Route                    | Accepts                     |
//! |--------------------------|-----------------------------|
//! | `GET  /health`           | -                           |
//! | `POST /mcp`              | any method                  |
//! | `POST /mcp/initialize`   | `initialize`                |
//! | `POST /mcp/tools/list`   | `tools/list`                |
//! | `POST /mcp/tools/call`   | `tools/call`                |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tracing::{info, warn};

use super::http_logging::{log_requests, RequestsLoggingLevel};
use super::{Lifecycle, Transport, TransportError};
use crate::mcp::protocol::{methods, McpError, McpRequest, McpResponse, SERVER_VERSION};
use crate::mcp::{McpServer, SessionState};

const NAME: &str = "http";

/// Validated HTTP transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTransportConfig {
    pub bind_address: IpAddr,
    /// 0 picks an ephemeral port.
    pub port: u16,
    /// Limit for receiving a request body.
    pub read_timeout: Duration,
    /// Limit for producing a response. Zero disables it.
    pub write_timeout: Duration,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_timeout: Duration,
    pub logging_level: RequestsLoggingLevel,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(5),
            logging_level: RequestsLoggingLevel::default(),
        }
    }
}

impl HttpTransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            bail!("HTTP read timeout must be positive");
        }
        if self.shutdown_timeout.is_zero() {
            bail!("HTTP shutdown timeout must be positive");
        }
        Ok(())
    }
}

#[derive(Clone)]
struct HttpState {
    server: McpServer,
    started_at: Instant,
}

pub struct HttpTransport {
    config: HttpTransportConfig,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    router: Router,
    lifecycle: Lifecycle,
}

impl HttpTransport {
    /// Bind the listener now so that address problems surface at startup and
    /// the actual port is known before serving.
    pub async fn bind(config: HttpTransportConfig, server: McpServer) -> Result<Self> {
        config.validate()?;

        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP transport to {}", addr))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            router: make_router(server, &config),
            config,
            listener: Mutex::new(Some(listener)),
            local_addr,
            lifecycle: Lifecycle::new(NAME),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let _serving = self.lifecycle.begin()?;
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .context("HTTP listener already consumed")?;

        info!("MCP HTTP transport listening on {}", self.local_addr);

        let stop = self.lifecycle.cancellation().clone();
        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = shutdown.cancelled() => {}
                }
            })
            .await
            .context("HTTP server error")?;
        Ok(())
    }

    async fn stop(&self, grace: Duration) -> Result<(), TransportError> {
        self.lifecycle.stop(grace).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// The transport's routes and layers, usable without a listener.
pub fn make_router(server: McpServer, config: &HttpTransportConfig) -> Router {
    let state = HttpState {
        server,
        started_at: Instant::now(),
    };

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/mcp", post(rpc_any))
        .route("/mcp/initialize", post(rpc_initialize))
        .route("/mcp/tools/list", post(rpc_tools_list))
        .route("/mcp/tools/call", post(rpc_tools_call))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(RequestBodyTimeoutLayer::new(config.read_timeout)),
        );

    if !config.write_timeout.is_zero() {
        router = router.layer(TimeoutLayer::new(config.write_timeout));
    }

    router.layer(middleware::from_fn_with_state(
        config.logging_level,
        log_requests,
    ))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    version: &'static str,
    tools: usize,
}

async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: SERVER_VERSION,
        tools: state.server.registry().tool_count(),
    })
}

async fn rpc_any(State(state): State<HttpState>, body: Bytes) -> Response {
    handle_rpc(&state, None, &body).await
}

async fn rpc_initialize(State(state): State<HttpState>, body: Bytes) -> Response {
    handle_rpc(&state, Some(methods::INITIALIZE), &body).await
}

async fn rpc_tools_list(State(state): State<HttpState>, body: Bytes) -> Response {
    handle_rpc(&state, Some(methods::TOOLS_LIST), &body).await
}

async fn rpc_tools_call(State(state): State<HttpState>, body: Bytes) -> Response {
    handle_rpc(&state, Some(methods::TOOLS_CALL), &body).await
}

async fn handle_rpc(state: &HttpState, endpoint_method: Option<&str>, body: &[u8]) -> Response {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => return rpc_error(None, McpError::ParseError(e.to_string())),
    };

    let id = McpRequest::peek_id(&value);
    let request = match McpRequest::from_value(value, false) {
        Ok(request) => request,
        Err(e) => return rpc_error(id, e),
    };

    if let Some(expected) = endpoint_method {
        if request.method != expected {
            return rpc_error(
                request.id,
                McpError::InvalidRequest(format!(
                    "method '{}' cannot be sent to the {} endpoint",
                    request.method, expected
                )),
            );
        }
    }

    if request.id.is_none() {
        if request.method.starts_with("notifications/") {
            return StatusCode::ACCEPTED.into_response();
        }
        return rpc_error(None, McpError::InvalidRequest("missing field 'id'".to_string()));
    }

    let mut session = SessionState::stateless();
    match state.server.dispatch(&request, &mut session).await {
        Ok(result) => (StatusCode::OK, Json(McpResponse::success(request.id, result))).into_response(),
        Err(e) => rpc_error(request.id, e),
    }
}

/// HTTP status for a protocol error.
pub fn http_status(error: &McpError) -> StatusCode {
    match error {
        McpError::ParseError(_)
        | McpError::InvalidRequest(_)
        | McpError::InvalidParams(_)
        | McpError::NotInitialized => StatusCode::BAD_REQUEST,
        McpError::MethodNotFound(_) | McpError::ToolNotFound(_) => StatusCode::NOT_FOUND,
        McpError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn rpc_error(id: Option<crate::mcp::protocol::RequestId>, error: McpError) -> Response {
    let status = http_status(&error);
    if status.is_server_error() {
        warn!("MCP request failed: {}", error);
    }
    (status, Json(McpResponse::error(id, error))).into_response()
}
