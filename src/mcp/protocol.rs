//! MCP Protocol Types
//!
//! MCP is JSON-RPC 2.0 with specific method names and schemas. Only the
//! subset needed to list and call tools is modelled here.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version we support
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "cluster-tools-server";

/// `<crate version>-<git hash>`
pub const SERVER_VERSION: &str = env!("SERVER_VERSION");

// ============================================================================
// Core Message Types
// ============================================================================

/// Incoming request from an MCP client. A missing `id` marks a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct McpRequest {
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Option<Value>,
}

impl McpRequest {
    /// Validate the JSON-RPC envelope of an already parsed JSON document.
    ///
    /// `jsonrpc` must be the string `"2.0"`, `method` a string and `id`, when
    /// present, a string or an integer. With `require_id` a missing `id` is an
    /// invalid request.
    pub fn from_value(value: Value, require_id: bool) -> Result<Self, McpError> {
        let mut object = match value {
            Value::Object(object) => object,
            _ => {
                return Err(McpError::InvalidRequest(
                    "request must be a JSON object".to_string(),
                ))
            }
        };

        match object.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(Value::String(v)) => {
                return Err(McpError::InvalidRequest(format!(
                    "unsupported jsonrpc version '{}'",
                    v
                )))
            }
            Some(_) => {
                return Err(McpError::InvalidRequest(
                    "field 'jsonrpc' must be a string".to_string(),
                ))
            }
            None => {
                return Err(McpError::InvalidRequest(
                    "missing field 'jsonrpc'".to_string(),
                ))
            }
        }

        let id = match object.remove("id") {
            None | Some(Value::Null) if require_id => {
                return Err(McpError::InvalidRequest("missing field 'id'".to_string()))
            }
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<RequestId>(raw).map_err(|_| {
                McpError::InvalidRequest("field 'id' must be a string or an integer".to_string())
            })?),
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(McpError::InvalidRequest(
                    "field 'method' must be a string".to_string(),
                ))
            }
            None => {
                return Err(McpError::InvalidRequest(
                    "missing field 'method'".to_string(),
                ))
            }
        };

        let params = object.remove("params").filter(|p| !p.is_null());

        Ok(Self { id, method, params })
    }

    /// Best-effort id extraction for error responses to requests that failed
    /// validation.
    pub fn peek_id(value: &Value) -> Option<RequestId> {
        value
            .get("id")
            .cloned()
            .and_then(|raw| serde_json::from_value(raw).ok())
    }
}

/// Response to MCP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpErrorResponse>,
}

impl McpResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Request ID can be string or number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// Error Codes (JSON-RPC + MCP specific)
// ============================================================================

/// Protocol-level errors. Tool failures are never reported this way, they
/// travel in-band as an `isError` tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum McpError {
    // JSON-RPC standard errors
    ParseError(String),
    InvalidRequest(String),
    MethodNotFound(String),
    InvalidParams(String),
    InternalError(String),

    // Server specific errors
    NotInitialized,
    ToolNotFound(String),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::InternalError(_) => -32603,
            McpError::NotInitialized => -32002,
            McpError::ToolNotFound(_) => -32004,
        }
    }

    pub fn message(&self) -> String {
        match self {
            McpError::ParseError(msg) => format!("Parse error: {}", msg),
            McpError::InvalidRequest(msg) => format!("Invalid request: {}", msg),
            McpError::MethodNotFound(method) => format!("Method not found: {}", method),
            McpError::InvalidParams(msg) => format!("Invalid params: {}", msg),
            McpError::InternalError(msg) => format!("Internal error: {}", msg),
            McpError::NotInitialized => "Server not initialized".to_string(),
            McpError::ToolNotFound(name) => format!("Unknown tool: {}", name),
        }
    }

    /// Short machine readable category, reported as `data.details.error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            McpError::ParseError(_) => "parse_error",
            McpError::InvalidRequest(_) => "invalid_request",
            McpError::MethodNotFound(_) => "method_not_found",
            McpError::InvalidParams(_) => "invalid_params",
            McpError::InternalError(_) => "internal_error",
            McpError::NotInitialized => "not_initialized",
            McpError::ToolNotFound(_) => "tool_not_found",
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            McpError::ParseError(_) => Some("Check that the request body is valid JSON"),
            McpError::InvalidRequest(_) => Some(
                "Send a JSON-RPC 2.0 object with 'jsonrpc': \"2.0\", an 'id' and a 'method'",
            ),
            McpError::InvalidParams(_) => Some("Check the method parameters against the schema"),
            McpError::MethodNotFound(_) => {
                Some("Supported methods: initialize, ping, tools/list, tools/call")
            }
            McpError::NotInitialized => Some("Send 'initialize' first"),
            McpError::ToolNotFound(_) => Some("Use tools/list to see the available tools"),
            McpError::InternalError(_) => None,
        }
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for McpError {}

impl From<McpError> for McpErrorResponse {
    fn from(err: McpError) -> Self {
        let mut details = Map::new();
        details.insert("error_type".into(), json!(err.error_type()));
        if let Some(suggestion) = err.suggestion() {
            details.insert("suggestion".into(), json!(suggestion));
        }

        McpErrorResponse {
            code: err.code(),
            message: err.message(),
            data: Some(json!({ "details": details })),
        }
    }
}

// ============================================================================
// MCP Method Names
// ============================================================================

pub mod methods {
    // Lifecycle
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";

    // Tools
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    // Ping
    pub const PING: &str = "ping";
}

// ============================================================================
// Initialize Messages
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializeParams {
    pub protocol_version: Option<String>,
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl InitializeResult {
    pub fn current() -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        }
    }
}

// ============================================================================
// Tools Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResultContent {
    Text { text: String },
}

impl ToolsCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let text = serde_json::to_string_pretty(value)?;
        Ok(Self::text(text))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// All text content joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolResultContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Ping
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PingResult {}
