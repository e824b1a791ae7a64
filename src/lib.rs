//! Cluster Tools Server Library
//!
//! An MCP server exposing Kubernetes-ecosystem CLIs and HTTP APIs as tools.
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod exec;
pub mod mcp;
pub mod rest;
pub mod server;
pub mod transport;

// Re-export commonly used types for convenience
pub use mcp::{McpRegistry, McpServer, ToolContext, ToolEnvironment, ToolProvider};
pub use server::run;
pub use transport::{HttpTransport, StdioTransport, Transport};
