//! MCP request dispatch
//!
//! [`McpServer`] turns validated JSON-RPC requests into responses. Both
//! transports go through it so a tool behaves the same whichever way it is
//! reached.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::context::ToolEnvironment;
use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    ToolsCallParams, ToolsCallResult, ToolsListResult,
};
use super::registry::McpRegistry;

/// Per-connection protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    gated: bool,
    initialized: bool,
}

impl SessionState {
    /// A long-lived session that must `initialize` before using tools.
    pub fn gated() -> Self {
        Self {
            gated: true,
            initialized: false,
        }
    }

    /// Every request stands alone.
    pub fn stateless() -> Self {
        Self {
            gated: false,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn check_ready(&self) -> Result<(), McpError> {
        if self.gated && !self.initialized {
            Err(McpError::NotInitialized)
        } else {
            Ok(())
        }
    }
}

/// Shared dispatcher for every transport.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<McpRegistry>,
    environment: ToolEnvironment,
    shutdown: CancellationToken,
}

impl McpServer {
    pub fn new(registry: Arc<McpRegistry>, environment: ToolEnvironment) -> Self {
        Self {
            registry,
            environment,
            shutdown: CancellationToken::new(),
        }
    }

    /// In-flight tool calls are cancelled, and their subprocesses killed, when
    /// `token` is cancelled.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn registry(&self) -> &McpRegistry {
        &self.registry
    }

    /// Handle one line-delimited message. Returns `None` for notifications.
    pub async fn handle_text(&self, text: &str, session: &mut SessionState) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                return Some(McpResponse::error(
                    None,
                    McpError::ParseError(e.to_string()),
                ))
            }
        };

        let id = McpRequest::peek_id(&value);
        match McpRequest::from_value(value, false) {
            Ok(request) => self.handle_request(request, session).await,
            Err(e) => Some(McpResponse::error(id, e)),
        }
    }

    /// Handle a validated request. Notifications are processed but produce no
    /// response.
    pub async fn handle_request(
        &self,
        request: McpRequest,
        session: &mut SessionState,
    ) -> Option<McpResponse> {
        let Some(id) = request.id.clone() else {
            handle_notification(&request);
            return None;
        };

        Some(match self.dispatch(&request, session).await {
            Ok(value) => McpResponse::success(Some(id), value),
            Err(error) => McpResponse::error(Some(id), error),
        })
    }

    /// Route a request to its method handler.
    pub async fn dispatch(
        &self,
        request: &McpRequest,
        session: &mut SessionState,
    ) -> Result<Value, McpError> {
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request, session),
            methods::INITIALIZED => Ok(Value::Object(Default::default())),
            methods::PING => to_value(PingResult {}),
            methods::TOOLS_LIST => {
                session.check_ready()?;
                to_value(ToolsListResult {
                    tools: self.registry.list_tools(),
                })
            }
            methods::TOOLS_CALL => {
                session.check_ready()?;
                let params: ToolsCallParams = decode_params(request.params.clone())?
                    .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;
                let result = self.call_tool(params).await?;
                to_value(result)
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(
        &self,
        request: &McpRequest,
        session: &mut SessionState,
    ) -> Result<Value, McpError> {
        let params: InitializeParams = decode_params(request.params.clone())?.unwrap_or_default();

        if let Some(client) = &params.client_info {
            info!(
                "MCP client '{}' ({}) initializing",
                client.name,
                client.version.as_deref().unwrap_or("unknown version")
            );
        }
        if let Some(version) = &params.protocol_version {
            if version != super::protocol::MCP_PROTOCOL_VERSION {
                debug!("Client requested protocol version {}", version);
            }
        }

        session.initialized = true;
        to_value(InitializeResult::current())
    }

    /// Run a tool by name. An unknown name is a protocol error, everything the
    /// tool itself reports is in-band.
    pub async fn call_tool(&self, params: ToolsCallParams) -> Result<ToolsCallResult, McpError> {
        let tool = self
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        let ctx = self.environment.context(self.shutdown.child_token());
        let arguments = params
            .arguments
            .unwrap_or_else(|| Value::Object(Default::default()));

        let span = tracing::info_span!("tool_call", tool = %tool.name);
        let result = tool.call(ctx, arguments).instrument(span).await;

        match &result {
            Ok(r) if r.is_error => debug!("Tool '{}' returned an error result", tool.name),
            Ok(_) => debug!("Tool '{}' completed", tool.name),
            Err(e) => warn!("Tool '{}' failed internally: {}", tool.name, e),
        }
        result
    }
}

fn handle_notification(request: &McpRequest) {
    match request.method.as_str() {
        methods::INITIALIZED => debug!("Client confirmed initialization"),
        other => debug!("Ignoring notification '{}'", other),
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<Option<T>, McpError> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockShellExecutor;
    use crate::mcp::params::{NoParams, Param};
    use crate::mcp::registry::ToolBuilder;
    use crate::rest::MockRestClient;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct VersionParams {
        client: Option<String>,
    }

    fn test_server() -> (McpServer, Arc<MockShellExecutor>) {
        let mut registry = McpRegistry::new();
        registry
            .register_tool(
                ToolBuilder::new("kubectl_version")
                    .description("kubectl version")
                    .params(&[Param::optional("client", "Client only")])
                    .build(|ctx, p: VersionParams| async move {
                        let output = ctx
                            .command("kubectl")
                            .with_arg("version")
                            .with_flag("--client", p.client.as_deref() == Some("true"))
                            .execute(&ctx)
                            .await;
                        Ok(match output {
                            Ok(out) => ToolsCallResult::text(out),
                            Err(e) => ToolsCallResult::error(format!("Error getting version: {}", e)),
                        })
                    }),
            )
            .unwrap();
        registry
            .register_tool(ToolBuilder::new("noop").build(|_ctx, _p: NoParams| async move {
                Ok(ToolsCallResult::text("ok"))
            }))
            .unwrap();

        let mock = Arc::new(MockShellExecutor::new());
        let env = ToolEnvironment::with_backends(mock.clone(), Arc::new(MockRestClient::new()));
        (McpServer::new(Arc::new(registry), env), mock)
    }

    #[tokio::test]
    async fn test_gated_session_requires_initialize() {
        let (server, _) = test_server();
        let mut session = SessionState::gated();

        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, &mut session)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32002);

        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{}}"#, &mut session)
            .await
            .unwrap();
        assert!(resp.error.is_none());
        assert_eq!(resp.result.unwrap()["serverInfo"]["name"], "cluster-tools-server");

        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#, &mut session)
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 2);
    }

    #[tokio::test]
    async fn test_stateless_session_skips_gating() {
        let (server, _) = test_server();
        let mut session = SessionState::stateless();
        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, &mut session)
            .await
            .unwrap();
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let (server, _) = test_server();
        let mut session = SessionState::gated();
        let resp = server
            .handle_text(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                &mut session,
            )
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_parse_error_then_recovery() {
        let (server, _) = test_server();
        let mut session = SessionState::gated();

        let resp = server.handle_text("{invalid json}", &mut session).await.unwrap();
        assert_eq!(resp.error.unwrap().code, -32700);
        assert_eq!(resp.jsonrpc, "2.0");

        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#, &mut session)
            .await
            .unwrap();
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let (server, _) = test_server();
        let mut session = SessionState::stateless();

        let resp = server
            .handle_text(r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#, &mut session)
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);

        let resp = server
            .handle_text(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"nope"}}"#,
                &mut session,
            )
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32004);
    }

    #[tokio::test]
    async fn test_tool_call_uses_environment_executor() {
        let (server, mock) = test_server();
        mock.add_command_string("kubectl", &["version", "--client"], "Client Version: v1.30", None);

        let result = server
            .call_tool(ToolsCallParams {
                name: "kubectl_version".to_string(),
                arguments: Some(json!({"client": "true"})),
            })
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "Client Version: v1.30");
    }

    #[tokio::test]
    async fn test_subprocess_failure_is_in_band() {
        let (server, mock) = test_server();
        mock.add_command_string("kubectl", &["version"], "", Some("connection refused"));

        let result = server
            .call_tool(ToolsCallParams {
                name: "kubectl_version".to_string(),
                arguments: None,
            })
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.joined_text(), "Error getting version: connection refused");
    }
}
