//! Prometheus Tools
//!
//! Queries go to the Prometheus HTTP API through the context's REST client.

use serde::Deserialize;
use serde_json::Value;

use super::failure;
use crate::mcp::context::ToolContext;
use crate::mcp::params::Param;
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};
use crate::rest::RestRequest;

const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";
const DEFAULT_STEP: &str = "60s";

const PROMETHEUS_URL: Param = Param::optional(
    "prometheus_url",
    "Prometheus base URL (default: http://localhost:9090)",
);

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        query_tool(),
        query_range_tool(),
        label_names_tool(),
        targets_tool(),
    ]
}

fn api_url(base: Option<&str>, path: &str) -> String {
    let base = base
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_PROMETHEUS_URL);
    format!("{}/api/v1/{}", base.trim_end_matches('/'), path)
}

/// Send the request and unwrap the `{"status": "success", "data": ...}`
/// envelope into pretty JSON.
async fn fetch(ctx: &ToolContext, request: RestRequest, doing: &str) -> ToolResult {
    let Some(client) = ctx.rest_client() else {
        return Ok(failure(doing, "no HTTP client available"));
    };

    let body = match client.get_json(request).await {
        Ok(body) => body,
        Err(e) => return Ok(failure(doing, e)),
    };

    if body.get("status").and_then(Value::as_str) != Some("success") {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response");
        return Ok(failure(doing, reason));
    }

    let data = body.get("data").cloned().unwrap_or(Value::Null);
    Ok(ToolsCallResult::json(&data).unwrap_or_else(|e| failure(doing, e)))
}

// ============================================================================
// prometheus_query
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryParams {
    query: String,
    time: Option<String>,
    prometheus_url: Option<String>,
}

fn query_tool() -> RegisteredTool {
    ToolBuilder::new("prometheus_query")
        .description("Evaluate a PromQL instant query")
        .params(&[
            Param::required("query", "PromQL expression"),
            Param::optional("time", "Evaluation time, RFC 3339 or unix timestamp (default: now)"),
            PROMETHEUS_URL,
        ])
        .build(query_handler)
}

async fn query_handler(ctx: ToolContext, p: QueryParams) -> ToolResult {
    let request = RestRequest::get(api_url(p.prometheus_url.as_deref(), "query"))
        .query("query", p.query)
        .query_opt("time", p.time.as_deref());
    fetch(&ctx, request, "querying Prometheus").await
}

// ============================================================================
// prometheus_query_range
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryRangeParams {
    query: String,
    start: String,
    end: String,
    step: Option<String>,
    prometheus_url: Option<String>,
}

fn query_range_tool() -> RegisteredTool {
    ToolBuilder::new("prometheus_query_range")
        .description("Evaluate a PromQL query over a time range")
        .params(&[
            Param::required("query", "PromQL expression"),
            Param::required("start", "Range start, RFC 3339 or unix timestamp"),
            Param::required("end", "Range end, RFC 3339 or unix timestamp"),
            Param::optional("step", "Resolution step (default: 60s)"),
            PROMETHEUS_URL,
        ])
        .build(query_range_handler)
}

async fn query_range_handler(ctx: ToolContext, p: QueryRangeParams) -> ToolResult {
    let step = p
        .step
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STEP.to_string());
    let request = RestRequest::get(api_url(p.prometheus_url.as_deref(), "query_range"))
        .query("query", p.query)
        .query("start", p.start)
        .query("end", p.end)
        .query("step", step);
    fetch(&ctx, request, "querying Prometheus range").await
}

// ============================================================================
// prometheus_label_names / prometheus_targets
// ============================================================================

#[derive(Debug, Deserialize)]
struct EndpointParams {
    prometheus_url: Option<String>,
}

fn label_names_tool() -> RegisteredTool {
    ToolBuilder::new("prometheus_label_names")
        .description("All label names known to Prometheus")
        .params(&[PROMETHEUS_URL])
        .build(label_names_handler)
}

async fn label_names_handler(ctx: ToolContext, p: EndpointParams) -> ToolResult {
    let request = RestRequest::get(api_url(p.prometheus_url.as_deref(), "labels"));
    fetch(&ctx, request, "getting Prometheus label names").await
}

fn targets_tool() -> RegisteredTool {
    ToolBuilder::new("prometheus_targets")
        .description("Scrape targets and their health")
        .params(&[PROMETHEUS_URL])
        .build(targets_handler)
}

async fn targets_handler(ctx: ToolContext, p: EndpointParams) -> ToolResult {
    let request = RestRequest::get(api_url(p.prometheus_url.as_deref(), "targets"));
    fetch(&ctx, request, "getting Prometheus targets").await
}
