//! Argo Tools
//!
//! Argo Rollouts through the `kubectl argo rollouts` plugin, ArgoCD through
//! its REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{failure, run_command};
use crate::exec::CommandBuilder;
use crate::mcp::context::ToolContext;
use crate::mcp::params::{flag, NoParams, Param};
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};
use crate::rest::RestRequest;
use reqwest::Url;

const DEFAULT_ROLLOUTS_NAMESPACE: &str = "argo-rollouts";
const DEFAULT_ROLLOUTS_SELECTOR: &str = "app.kubernetes.io/name=argo-rollouts";

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        verify_controller_tool(),
        verify_plugin_tool(),
        promote_rollout_tool(),
        pause_rollout_tool(),
        set_rollout_image_tool(),
        list_applications_tool(),
        get_application_tool(),
    ]
}

/// `kubectl argo rollouts <args>`
fn rollouts(ctx: &ToolContext) -> CommandBuilder {
    ctx.command("kubectl").with_args(["argo", "rollouts"])
}

// ============================================================================
// argo_verify_argo_rollouts_controller_install
// ============================================================================

#[derive(Debug, Deserialize)]
struct VerifyControllerParams {
    namespace: Option<String>,
    label: Option<String>,
}

fn verify_controller_tool() -> RegisteredTool {
    ToolBuilder::new("argo_verify_argo_rollouts_controller_install")
        .description("Check that the Argo Rollouts controller pods are running")
        .params(&[
            Param::optional("namespace", "Controller namespace (default: argo-rollouts)"),
            Param::optional("label", "Controller pod selector (default: app.kubernetes.io/name=argo-rollouts)"),
        ])
        .build(verify_controller_handler)
}

async fn verify_controller_handler(ctx: ToolContext, p: VerifyControllerParams) -> ToolResult {
    let namespace = p
        .namespace
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLLOUTS_NAMESPACE.to_string());
    let label = p
        .label
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_ROLLOUTS_SELECTOR.to_string());

    let builder = ctx.command("kubectl").with_args([
        "get",
        "pods",
        "-n",
        namespace.as_str(),
        "-l",
        label.as_str(),
        "-o",
        "jsonpath={.items[*].status.phase}",
    ]);
    let output = match builder.execute(&ctx).await {
        Ok(output) => output,
        Err(e) => return Ok(failure("checking Argo Rollouts controller", e)),
    };

    let phases: Vec<&str> = output.split_whitespace().collect();
    if phases.is_empty() {
        return Ok(ToolsCallResult::error(format!(
            "Error checking Argo Rollouts controller: no controller pods found in namespace {}",
            namespace
        )));
    }
    let running = phases.iter().filter(|p| **p == "Running").count();
    if running == phases.len() {
        Ok(ToolsCallResult::text(format!(
            "All {} Argo Rollouts controller pods are running",
            running
        )))
    } else {
        Ok(ToolsCallResult::error(format!(
            "Error checking Argo Rollouts controller: {} of {} pods running (phases: {})",
            running,
            phases.len(),
            phases.join(", ")
        )))
    }
}

// ============================================================================
// argo_verify_kubectl_plugin_install
// ============================================================================

fn verify_plugin_tool() -> RegisteredTool {
    ToolBuilder::new("argo_verify_kubectl_plugin_install")
        .description("Check that the kubectl argo rollouts plugin is installed")
        .build(verify_plugin_handler)
}

async fn verify_plugin_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    run_command(&ctx, rollouts(&ctx).with_arg("version"), "checking kubectl argo rollouts plugin").await
}

// ============================================================================
// argo_promote_rollout / argo_pause_rollout
// ============================================================================

#[derive(Debug, Deserialize)]
struct PromoteParams {
    rollout_name: String,
    namespace: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    full: bool,
}

fn promote_rollout_tool() -> RegisteredTool {
    ToolBuilder::new("argo_promote_rollout")
        .description("Promote a paused rollout to the next step")
        .params(&[
            Param::required("rollout_name", "Rollout name"),
            Param::optional("namespace", "Rollout namespace"),
            Param::optional("full", "Skip remaining steps (\"true\"/\"false\")").flag(),
        ])
        .build(promote_rollout_handler)
}

async fn promote_rollout_handler(ctx: ToolContext, p: PromoteParams) -> ToolResult {
    let builder = rollouts(&ctx)
        .with_args(["promote", p.rollout_name.as_str()])
        .with_flag_value("-n", p.namespace)
        .with_flag("--full", p.full);
    run_command(&ctx, builder, "promoting rollout").await
}

#[derive(Debug, Deserialize)]
struct PauseParams {
    rollout_name: String,
    namespace: Option<String>,
}

fn pause_rollout_tool() -> RegisteredTool {
    ToolBuilder::new("argo_pause_rollout")
        .description("Pause a rollout")
        .params(&[
            Param::required("rollout_name", "Rollout name"),
            Param::optional("namespace", "Rollout namespace"),
        ])
        .build(pause_rollout_handler)
}

async fn pause_rollout_handler(ctx: ToolContext, p: PauseParams) -> ToolResult {
    let builder = rollouts(&ctx)
        .with_args(["pause", p.rollout_name.as_str()])
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "pausing rollout").await
}

// ============================================================================
// argo_set_rollout_image
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetImageParams {
    rollout_name: String,
    container_image: String,
    namespace: Option<String>,
}

fn set_rollout_image_tool() -> RegisteredTool {
    ToolBuilder::new("argo_set_rollout_image")
        .description("Update the image of a rollout container")
        .params(&[
            Param::required("rollout_name", "Rollout name"),
            Param::required("container_image", "container=image, e.g. web=nginx:1.25"),
            Param::optional("namespace", "Rollout namespace"),
        ])
        .build(set_rollout_image_handler)
}

async fn set_rollout_image_handler(ctx: ToolContext, p: SetImageParams) -> ToolResult {
    if !p.container_image.contains('=') {
        return Ok(failure(
            "setting rollout image",
            format!("expected container=image, got '{}'", p.container_image),
        ));
    }
    let builder = rollouts(&ctx)
        .with_args(["set", "image", p.rollout_name.as_str(), p.container_image.as_str()])
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "setting rollout image").await
}

// ============================================================================
// ArgoCD
// ============================================================================

/// Base request against the configured ArgoCD API. Each segment is
/// percent-encoded on its own, so a name can never change the endpoint.
fn argocd_request(ctx: &ToolContext, segments: &[&str]) -> Result<RestRequest, String> {
    let endpoint = ctx
        .argocd()
        .ok_or_else(|| "ArgoCD URL is not configured (--argocd-url)".to_string())?;
    let mut url = Url::parse(&endpoint.url)
        .map_err(|e| format!("invalid ArgoCD URL '{}': {}", endpoint.url, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("invalid ArgoCD URL '{}'", endpoint.url))?
        .pop_if_empty()
        .extend(["api", "v1"])
        .extend(segments);
    Ok(RestRequest::get(url.to_string()).bearer(endpoint.token.clone()))
}

async fn argocd_get(ctx: &ToolContext, request: Result<RestRequest, String>, doing: &str) -> Result<Value, ToolsCallResult> {
    let request = request.map_err(|e| failure(doing, e))?;
    let client = ctx
        .rest_client()
        .ok_or_else(|| failure(doing, "no HTTP client available"))?;
    client.get_json(request).await.map_err(|e| failure(doing, e))
}

#[derive(Debug, Serialize)]
struct ApplicationSummary {
    name: String,
    project: String,
    sync_status: String,
    health_status: String,
}

fn summarize_application(app: &Value) -> ApplicationSummary {
    let text = |pointer: &str| {
        app.pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string()
    };
    ApplicationSummary {
        name: text("/metadata/name"),
        project: text("/spec/project"),
        sync_status: text("/status/sync/status"),
        health_status: text("/status/health/status"),
    }
}

#[derive(Debug, Deserialize)]
struct ListApplicationsParams {
    project: Option<String>,
    selector: Option<String>,
}

fn list_applications_tool() -> RegisteredTool {
    ToolBuilder::new("argocd_list_applications")
        .description("List ArgoCD applications with sync and health status")
        .params(&[
            Param::optional("project", "Only applications of this project"),
            Param::optional("selector", "Label selector"),
        ])
        .build(list_applications_handler)
}

async fn list_applications_handler(ctx: ToolContext, p: ListApplicationsParams) -> ToolResult {
    let doing = "listing ArgoCD applications";
    let request = argocd_request(&ctx, &["applications"]).map(|r| {
        r.query_opt("projects", p.project.as_deref())
            .query_opt("selector", p.selector.as_deref())
    });
    let body = match argocd_get(&ctx, request, doing).await {
        Ok(body) => body,
        Err(result) => return Ok(result),
    };

    let summaries: Vec<ApplicationSummary> = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(summarize_application).collect())
        .unwrap_or_default();
    Ok(ToolsCallResult::json(&summaries).unwrap_or_else(|e| failure(doing, e)))
}

#[derive(Debug, Deserialize)]
struct GetApplicationParams {
    name: String,
}

fn get_application_tool() -> RegisteredTool {
    ToolBuilder::new("argocd_get_application")
        .description("Full ArgoCD application resource")
        .params(&[Param::required("name", "Application name")])
        .build(get_application_handler)
}

async fn get_application_handler(ctx: ToolContext, p: GetApplicationParams) -> ToolResult {
    let doing = "getting ArgoCD application";
    let request = argocd_request(&ctx, &["applications", p.name.as_str()]);
    match argocd_get(&ctx, request, doing).await {
        Ok(body) => Ok(ToolsCallResult::json(&body).unwrap_or_else(|e| failure(doing, e))),
        Err(result) => Ok(result),
    }
}
