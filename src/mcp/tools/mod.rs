//! MCP Tools
//!
//! One module per tool provider. Every tool follows the same shape: a static
//! parameter table, a typed parameter struct, and a handler that builds one
//! command line (or REST request) and wraps the outcome.

pub mod argo;
pub mod cilium;
pub mod helm;
pub mod istio;
pub mod k8s;
pub mod prometheus;
pub mod utils;

use crate::exec::CommandBuilder;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::ToolResult;

/// Run `builder` and wrap its combined output. Failures become an in-band
/// error result reading `Error <doing>: <cause>`.
pub(crate) async fn run_command(ctx: &ToolContext, builder: CommandBuilder, doing: &str) -> ToolResult {
    Ok(match builder.execute(ctx).await {
        Ok(output) => ToolsCallResult::text(output),
        Err(e) => failure(doing, e),
    })
}

pub(crate) fn failure(doing: &str, cause: impl std::fmt::Display) -> ToolsCallResult {
    ToolsCallResult::error(format!("Error {}: {}", doing, cause))
}

/// Split `a=1, b=2` style lists, dropping blanks.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::exec::MockShellExecutor;
    use crate::mcp::context::ToolContext;
    use crate::mcp::protocol::ToolsCallResult;
    use crate::mcp::registry::RegisteredTool;

    pub fn mock_context() -> (ToolContext, Arc<MockShellExecutor>) {
        let mock = Arc::new(MockShellExecutor::new());
        let ctx = ToolContext::new().with_shell_executor(mock.clone());
        (ctx, mock)
    }

    pub async fn call(tools: &[RegisteredTool], name: &str, ctx: ToolContext, args: Value) -> ToolsCallResult {
        let tool = tools
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("tool {} not found", name));
        tool.call(ctx, args).await.unwrap()
    }
}
