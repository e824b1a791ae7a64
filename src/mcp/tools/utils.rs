//! Utility Tools
//!
//! Generic shell access and the current time.

use serde::Deserialize;

use super::{failure, run_command};
use crate::mcp::context::ToolContext;
use crate::mcp::params::{NoParams, Param};
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};

pub fn tools() -> Vec<RegisteredTool> {
    vec![shell_tool(), datetime_tool()]
}

// ============================================================================
// shell
// ============================================================================

#[derive(Debug, Deserialize)]
struct ShellParams {
    command: String,
}

fn shell_tool() -> RegisteredTool {
    ToolBuilder::new("shell")
        .description(
            "Execute a command line. The line is split with shell quoting rules and run \
             directly, without a shell; pipes, redirects and variables are not expanded",
        )
        .params(&[Param::required("command", "The command line to run")])
        .build(shell_handler)
}

async fn shell_handler(ctx: ToolContext, params: ShellParams) -> ToolResult {
    let Some(argv) = shlex::split(&params.command) else {
        return Ok(failure("parsing command", "unbalanced quotes"));
    };
    let Some((program, args)) = argv.split_first() else {
        return Ok(failure("parsing command", "empty command"));
    };

    let builder = ctx.command(program).with_args(args.iter().cloned());
    run_command(&ctx, builder, "executing command").await
}

// ============================================================================
// datetime_get_current_time
// ============================================================================

fn datetime_tool() -> RegisteredTool {
    ToolBuilder::new("datetime_get_current_time")
        .description("Current time in UTC, RFC 3339 format")
        .build(datetime_handler)
}

async fn datetime_handler(_ctx: ToolContext, _params: NoParams) -> ToolResult {
    Ok(ToolsCallResult::text(chrono::Utc::now().to_rfc3339()))
}
