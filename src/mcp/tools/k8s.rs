//! Kubernetes Tools
//!
//! Thin wrappers over `kubectl`.

use std::io::Write;
use std::time::Duration;

use serde::Deserialize;

use super::{failure, run_command, split_list};
use crate::mcp::context::ToolContext;
use crate::mcp::params::{flag, number, opt_number, NoParams, Param};
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};

const API_RESOURCES_CACHE_TTL: Duration = Duration::from_secs(300);

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        get_resources_tool(),
        describe_resource_tool(),
        get_pod_logs_tool(),
        get_events_tool(),
        scale_tool(),
        delete_resource_tool(),
        apply_manifest_tool(),
        rollout_restart_tool(),
        get_api_resources_tool(),
        get_cluster_configuration_tool(),
        label_resource_tool(),
        annotate_resource_tool(),
    ]
}

const NAMESPACE: Param = Param::optional("namespace", "Namespace (default: current context namespace)");
const ALL_NAMESPACES: Param = Param::optional("all_namespaces", "Query all namespaces (\"true\"/\"false\")").flag();
const RESOURCE_TYPE: Param = Param::required("resource_type", "Resource type, e.g. pods, deployments");
const RESOURCE_NAME: Param = Param::required("resource_name", "Resource name");

/// `-n <ns>` or `-A`; an explicit namespace wins.
fn namespace_args(namespace: Option<&str>, all_namespaces: bool) -> Vec<String> {
    match namespace {
        Some(ns) if !ns.is_empty() => vec!["-n".to_string(), ns.to_string()],
        _ if all_namespaces => vec!["-A".to_string()],
        _ => Vec::new(),
    }
}

// ============================================================================
// k8s_get_resources
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetResourcesParams {
    resource_type: String,
    resource_name: Option<String>,
    namespace: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    all_namespaces: bool,
    output: Option<String>,
}

fn get_resources_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_get_resources")
        .description("List or get Kubernetes resources")
        .params(&[
            RESOURCE_TYPE,
            Param::optional("resource_name", "Resource name, omit to list"),
            NAMESPACE,
            ALL_NAMESPACES,
            Param::optional("output", "Output format: wide, yaml, json, name (default: wide)"),
        ])
        .build(get_resources_handler)
}

async fn get_resources_handler(ctx: ToolContext, p: GetResourcesParams) -> ToolResult {
    let output = p.output.filter(|o| !o.is_empty()).unwrap_or_else(|| "wide".to_string());
    let builder = ctx
        .command("kubectl")
        .with_args(["get", p.resource_type.as_str()])
        .with_args(p.resource_name.filter(|n| !n.is_empty()))
        .with_args(namespace_args(p.namespace.as_deref(), p.all_namespaces))
        .with_args(["-o", output.as_str()]);
    run_command(&ctx, builder, "getting resources").await
}

// ============================================================================
// k8s_describe_resource
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResourceRefParams {
    resource_type: String,
    resource_name: String,
    namespace: Option<String>,
}

fn describe_resource_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_describe_resource")
        .description("Describe a Kubernetes resource")
        .params(&[RESOURCE_TYPE, RESOURCE_NAME, NAMESPACE])
        .build(describe_resource_handler)
}

async fn describe_resource_handler(ctx: ToolContext, p: ResourceRefParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["describe", p.resource_type.as_str(), p.resource_name.as_str()])
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "describing resource").await
}

// ============================================================================
// k8s_get_pod_logs
// ============================================================================

#[derive(Debug, Deserialize)]
struct PodLogsParams {
    pod_name: String,
    namespace: Option<String>,
    container: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    tail_lines: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    previous: bool,
}

fn get_pod_logs_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_get_pod_logs")
        .description("Get logs of a pod")
        .params(&[
            Param::required("pod_name", "Pod name"),
            NAMESPACE,
            Param::optional("container", "Container name"),
            Param::optional("tail_lines", "Number of lines from the end (default: 50)").number(),
            Param::optional("previous", "Logs of the previous container instance (\"true\"/\"false\")").flag(),
        ])
        .build(get_pod_logs_handler)
}

async fn get_pod_logs_handler(ctx: ToolContext, p: PodLogsParams) -> ToolResult {
    let tail = p.tail_lines.unwrap_or(50).to_string();
    let builder = ctx
        .command("kubectl")
        .with_args(["logs", p.pod_name.as_str()])
        .with_flag_value("-n", p.namespace)
        .with_flag_value("-c", p.container)
        .with_flag_value("--tail", Some(tail))
        .with_flag("--previous", p.previous);
    run_command(&ctx, builder, "getting pod logs").await
}

// ============================================================================
// k8s_get_events
// ============================================================================

#[derive(Debug, Deserialize)]
struct EventsParams {
    namespace: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    all_namespaces: bool,
    field_selector: Option<String>,
}

fn get_events_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_get_events")
        .description("List events, oldest first")
        .params(&[
            NAMESPACE,
            ALL_NAMESPACES,
            Param::optional("field_selector", "Field selector, e.g. involvedObject.name=web"),
        ])
        .build(get_events_handler)
}

async fn get_events_handler(ctx: ToolContext, p: EventsParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["get", "events"])
        .with_args(namespace_args(p.namespace.as_deref(), p.all_namespaces))
        .with_flag_value("--field-selector", p.field_selector)
        .with_args(["--sort-by", ".lastTimestamp"]);
    run_command(&ctx, builder, "getting events").await
}

// ============================================================================
// k8s_scale
// ============================================================================

#[derive(Debug, Deserialize)]
struct ScaleParams {
    resource_type: String,
    resource_name: String,
    #[serde(deserialize_with = "number")]
    replicas: u32,
    namespace: Option<String>,
}

fn scale_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_scale")
        .description("Scale a deployment, statefulset or replicaset")
        .params(&[
            RESOURCE_TYPE,
            RESOURCE_NAME,
            Param::required("replicas", "Desired replica count").number(),
            NAMESPACE,
        ])
        .build(scale_handler)
}

async fn scale_handler(ctx: ToolContext, p: ScaleParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_arg("scale")
        .with_arg(format!("{}/{}", p.resource_type, p.resource_name))
        .with_arg(format!("--replicas={}", p.replicas))
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "scaling resource").await
}

// ============================================================================
// k8s_delete_resource
// ============================================================================

fn delete_resource_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_delete_resource")
        .description("Delete a Kubernetes resource")
        .params(&[RESOURCE_TYPE, RESOURCE_NAME, NAMESPACE])
        .build(delete_resource_handler)
}

async fn delete_resource_handler(ctx: ToolContext, p: ResourceRefParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["delete", p.resource_type.as_str(), p.resource_name.as_str()])
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "deleting resource").await
}

// ============================================================================
// k8s_apply_manifest
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApplyManifestParams {
    manifest: String,
    namespace: Option<String>,
}

fn apply_manifest_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_apply_manifest")
        .description("Apply a YAML manifest")
        .params(&[Param::required("manifest", "Manifest content (YAML)"), NAMESPACE])
        .build(apply_manifest_handler)
}

async fn apply_manifest_handler(ctx: ToolContext, p: ApplyManifestParams) -> ToolResult {
    // The file must outlive the kubectl call.
    let manifest_file = match write_manifest(&p.manifest) {
        Ok(file) => file,
        Err(e) => return Ok(failure("writing manifest", e)),
    };

    let builder = ctx
        .command("kubectl")
        .with_args(["apply", "-f"])
        .with_arg(manifest_file.path().display().to_string())
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "applying manifest").await
}

fn write_manifest(manifest: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("manifest-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(manifest.as_bytes())?;
    file.flush()?;
    Ok(file)
}

// ============================================================================
// k8s_rollout_restart
// ============================================================================

#[derive(Debug, Deserialize)]
struct RolloutRestartParams {
    resource_name: String,
    resource_type: Option<String>,
    namespace: Option<String>,
}

fn rollout_restart_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_rollout_restart")
        .description("Restart the pods of a deployment, statefulset or daemonset")
        .params(&[
            RESOURCE_NAME,
            Param::optional("resource_type", "deployment, statefulset or daemonset (default: deployment)"),
            NAMESPACE,
        ])
        .build(rollout_restart_handler)
}

async fn rollout_restart_handler(ctx: ToolContext, p: RolloutRestartParams) -> ToolResult {
    let kind = p
        .resource_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "deployment".to_string());
    let builder = ctx
        .command("kubectl")
        .with_args(["rollout", "restart"])
        .with_arg(format!("{}/{}", kind, p.resource_name))
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "restarting rollout").await
}

// ============================================================================
// k8s_get_api_resources
// ============================================================================

fn get_api_resources_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_get_api_resources")
        .description("List the API resource types the cluster serves")
        .build(get_api_resources_handler)
}

async fn get_api_resources_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_arg("api-resources")
        .with_cache(API_RESOURCES_CACHE_TTL);
    run_command(&ctx, builder, "getting API resources").await
}

// ============================================================================
// k8s_get_cluster_configuration
// ============================================================================

fn get_cluster_configuration_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_get_cluster_configuration")
        .description("Show the active kubeconfig as JSON, credentials redacted")
        .build(get_cluster_configuration_handler)
}

async fn get_cluster_configuration_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["config", "view", "-o", "json"]);
    let output = match builder.execute(&ctx).await {
        Ok(output) => output,
        Err(e) => return Ok(failure("getting cluster configuration", e)),
    };

    match serde_json::from_str::<serde_json::Value>(&output) {
        Ok(config) => Ok(ToolsCallResult::json(&config)
            .unwrap_or_else(|e| failure("formatting cluster configuration", e))),
        Err(e) => Ok(failure("parsing cluster configuration", e)),
    }
}

// ============================================================================
// k8s_label_resource / k8s_annotate_resource
// ============================================================================

#[derive(Debug, Deserialize)]
struct LabelParams {
    resource_type: String,
    resource_name: String,
    labels: String,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateParams {
    resource_type: String,
    resource_name: String,
    annotations: String,
    namespace: Option<String>,
}

fn label_resource_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_label_resource")
        .description("Add or update labels on a resource")
        .params(&[
            RESOURCE_TYPE,
            RESOURCE_NAME,
            Param::required("labels", "Comma separated key=value pairs"),
            NAMESPACE,
        ])
        .build(label_resource_handler)
}

async fn label_resource_handler(ctx: ToolContext, p: LabelParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["label", p.resource_type.as_str(), p.resource_name.as_str()])
        .with_args(split_list(&p.labels))
        .with_arg("--overwrite")
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "labeling resource").await
}

fn annotate_resource_tool() -> RegisteredTool {
    ToolBuilder::new("k8s_annotate_resource")
        .description("Add or update annotations on a resource")
        .params(&[
            RESOURCE_TYPE,
            RESOURCE_NAME,
            Param::required("annotations", "Comma separated key=value pairs"),
            NAMESPACE,
        ])
        .build(annotate_resource_handler)
}

async fn annotate_resource_handler(ctx: ToolContext, p: AnnotateParams) -> ToolResult {
    let builder = ctx
        .command("kubectl")
        .with_args(["annotate", p.resource_type.as_str(), p.resource_name.as_str()])
        .with_args(split_list(&p.annotations))
        .with_arg("--overwrite")
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "annotating resource").await
}
