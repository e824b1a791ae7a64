//! MCP Tool Registry
//!
//! Manages registration and lookup of tools. The registry is filled once at
//! startup and then shared read-only behind an `Arc`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::context::ToolContext;
use super::params::{check_arguments, input_schema, Param};
use super::protocol::{McpError, ToolDefinition, ToolsCallResult};

// ============================================================================
// Tool Types
// ============================================================================

/// Result type for tool execution. `Err` is reserved for internal failures;
/// tool failures are `Ok` results with `is_error` set.
pub type ToolResult = Result<ToolsCallResult, McpError>;

/// Boxed future for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Tool handler function type
pub type ToolHandler = Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

/// A registered tool with metadata and handler
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub params: Vec<Param>,
    pub handler: ToolHandler,
}

impl RegisteredTool {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: input_schema(&self.params),
        }
    }

    pub fn required_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.required)
    }

    pub async fn call(&self, ctx: ToolContext, arguments: Value) -> ToolResult {
        (self.handler)(ctx, arguments).await
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

// ============================================================================
// Registry
// ============================================================================

/// Registry for MCP tools
#[derive(Default)]
pub struct McpRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A name that is already taken is rejected and the
    /// existing entry stays in place.
    pub fn register_tool(&mut self, tool: RegisteredTool) -> Result<(), RegistryError> {
        if self.tools.contains_key(&tool.name) {
            return Err(RegistryError::Duplicate(tool.name));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register a batch of tools, all or nothing. Returns the number added.
    pub fn register_all(&mut self, tools: Vec<RegisteredTool>) -> Result<usize, RegistryError> {
        let mut seen = std::collections::HashSet::new();
        for tool in &tools {
            if self.tools.contains_key(&tool.name) || !seen.insert(tool.name.as_str()) {
                return Err(RegistryError::Duplicate(tool.name.clone()));
            }
        }

        let count = tools.len();
        for tool in tools {
            self.tools.insert(tool.name.clone(), tool);
        }
        Ok(count)
    }

    /// All tool definitions, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(RegisteredTool::definition).collect()
    }

    pub fn tools(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.values()
    }

    pub fn get_tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Get the number of registered tools
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

// ============================================================================
// Builder helpers
// ============================================================================

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<Param>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn params(mut self, params: &[Param]) -> Self {
        self.params.extend_from_slice(params);
        self
    }

    /// Bind a typed handler.
    ///
    /// Before the handler runs, the arguments are checked against the
    /// parameter table and decoded into `P`. Either failure becomes an
    /// error result and the handler is never called.
    pub fn build<P, F, Fut>(self, handler: F) -> RegisteredTool
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(ToolContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let params = self.params.clone();
        RegisteredTool {
            name: self.name,
            description: self.description,
            params: self.params,
            handler: Arc::new(move |ctx: ToolContext, arguments: Value| -> ToolFuture {
                match decode_arguments::<P>(&params, arguments) {
                    Ok(typed) => Box::pin(handler(ctx, typed)),
                    Err(rejected) => Box::pin(async move { Ok(rejected) }),
                }
            }),
        }
    }
}

fn decode_arguments<P: DeserializeOwned>(
    params: &[Param],
    arguments: Value,
) -> Result<P, ToolsCallResult> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    check_arguments(params, &arguments).map_err(|e| ToolsCallResult::error(e.to_string()))?;

    serde_json::from_value(arguments)
        .map_err(|e| ToolsCallResult::error(format!("invalid arguments: {}", e)))
}
