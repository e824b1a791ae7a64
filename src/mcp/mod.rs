//! MCP (Model Context Protocol) Server
//!
//! Exposes cluster operations as MCP tools.
//!
//! ## Architecture
//!
//! - Protocol: JSON-RPC 2.0 envelopes, see [`protocol`]
//! - Dispatch: [`McpServer`], shared by every transport
//! - Tools: registered per [`ToolProvider`] into an [`McpRegistry`]
//! - Backends: reached through the per-call [`ToolContext`]

pub mod context;
pub mod error;
pub mod handler;
pub mod params;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod tools;

pub use context::{ArgoCdEndpoint, ToolContext, ToolEnvironment};
pub use error::ToolError;
pub use handler::{McpServer, SessionState};
pub use protocol::{McpError, McpRequest, McpResponse, ToolsCallResult};
pub use provider::{ToolProvider, UnknownProvider};
pub use registry::{McpRegistry, RegisteredTool, RegistryError, ToolBuilder, ToolResult};
