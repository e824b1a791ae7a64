//! Istio Tools
//!
//! Wrappers over `istioctl`.

use serde::Deserialize;

use super::run_command;
use crate::mcp::context::ToolContext;
use crate::mcp::params::{flag, NoParams, Param};
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        proxy_status_tool(),
        proxy_config_tool(),
        analyze_tool(),
        install_tool(),
        generate_manifest_tool(),
        version_tool(),
        remote_clusters_tool(),
        waypoint_list_tool(),
    ]
}

const NAMESPACE: Param = Param::optional("namespace", "Namespace");
const ALL_NAMESPACES: Param = Param::optional("all_namespaces", "All namespaces (\"true\"/\"false\")").flag();
const PROFILE: Param = Param::optional("profile", "Installation profile (default: default)");

#[derive(Debug, Deserialize)]
struct NamespaceScope {
    namespace: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    all_namespaces: bool,
}

impl NamespaceScope {
    fn args(&self) -> Vec<String> {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => vec!["-n".to_string(), ns.to_string()],
            _ if self.all_namespaces => vec!["--all-namespaces".to_string()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileParams {
    profile: Option<String>,
}

impl ProfileParams {
    fn set_profile(&self) -> String {
        let profile = self.profile.as_deref().filter(|p| !p.is_empty()).unwrap_or("default");
        format!("profile={}", profile)
    }
}

// ============================================================================
// istio_proxy_status
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProxyStatusParams {
    pod_name: Option<String>,
    namespace: Option<String>,
}

fn proxy_status_tool() -> RegisteredTool {
    ToolBuilder::new("istio_proxy_status")
        .description("Sync status of Envoy proxies in the mesh")
        .params(&[Param::optional("pod_name", "Limit to one pod"), NAMESPACE])
        .build(proxy_status_handler)
}

async fn proxy_status_handler(ctx: ToolContext, p: ProxyStatusParams) -> ToolResult {
    let builder = ctx
        .command("istioctl")
        .with_arg("proxy-status")
        .with_args(p.pod_name.filter(|n| !n.is_empty()))
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "getting proxy status").await
}

// ============================================================================
// istio_proxy_config
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProxyConfigParams {
    pod_name: String,
    config_type: Option<String>,
    namespace: Option<String>,
}

fn proxy_config_tool() -> RegisteredTool {
    ToolBuilder::new("istio_proxy_config")
        .description("Envoy configuration of a pod's sidecar")
        .params(&[
            Param::required("pod_name", "Pod name"),
            Param::optional(
                "config_type",
                "all, bootstrap, cluster, endpoint, listener, route or secret (default: all)",
            ),
            NAMESPACE,
        ])
        .build(proxy_config_handler)
}

async fn proxy_config_handler(ctx: ToolContext, p: ProxyConfigParams) -> ToolResult {
    let config_type = p
        .config_type
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "all".to_string());
    let builder = ctx
        .command("istioctl")
        .with_args(["proxy-config", config_type.as_str(), p.pod_name.as_str()])
        .with_flag_value("-n", p.namespace);
    run_command(&ctx, builder, "getting proxy configuration").await
}

// ============================================================================
// istio_analyze_cluster_configuration
// ============================================================================

fn analyze_tool() -> RegisteredTool {
    ToolBuilder::new("istio_analyze_cluster_configuration")
        .description("Analyze Istio configuration and report problems")
        .params(&[NAMESPACE, ALL_NAMESPACES])
        .build(analyze_handler)
}

async fn analyze_handler(ctx: ToolContext, p: NamespaceScope) -> ToolResult {
    let builder = ctx.command("istioctl").with_arg("analyze").with_args(p.args());
    run_command(&ctx, builder, "analyzing Istio configuration").await
}

// ============================================================================
// istio_install / istio_generate_manifest
// ============================================================================

fn install_tool() -> RegisteredTool {
    ToolBuilder::new("istio_install")
        .description("Install Istio with a configuration profile")
        .params(&[PROFILE])
        .build(install_handler)
}

async fn install_handler(ctx: ToolContext, p: ProfileParams) -> ToolResult {
    let builder = ctx
        .command("istioctl")
        .with_args(["install", "--set"])
        .with_arg(p.set_profile())
        .with_arg("-y");
    run_command(&ctx, builder, "installing Istio").await
}

fn generate_manifest_tool() -> RegisteredTool {
    ToolBuilder::new("istio_generate_manifest")
        .description("Generate the Istio install manifest for a profile")
        .params(&[PROFILE])
        .build(generate_manifest_handler)
}

async fn generate_manifest_handler(ctx: ToolContext, p: ProfileParams) -> ToolResult {
    let builder = ctx
        .command("istioctl")
        .with_args(["manifest", "generate", "--set"])
        .with_arg(p.set_profile());
    run_command(&ctx, builder, "generating Istio manifest").await
}

// ============================================================================
// istio_version / istio_remote_clusters
// ============================================================================

fn version_tool() -> RegisteredTool {
    ToolBuilder::new("istio_version")
        .description("Client and control plane versions")
        .build(version_handler)
}

async fn version_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("istioctl").with_arg("version");
    run_command(&ctx, builder, "getting Istio version").await
}

fn remote_clusters_tool() -> RegisteredTool {
    ToolBuilder::new("istio_remote_clusters")
        .description("Remote clusters known to the control plane")
        .build(remote_clusters_handler)
}

async fn remote_clusters_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("istioctl").with_arg("remote-clusters");
    run_command(&ctx, builder, "listing remote clusters").await
}

// ============================================================================
// istio_waypoint_list
// ============================================================================

fn waypoint_list_tool() -> RegisteredTool {
    ToolBuilder::new("istio_waypoint_list")
        .description("List ambient mode waypoint proxies")
        .params(&[NAMESPACE, ALL_NAMESPACES])
        .build(waypoint_list_handler)
}

async fn waypoint_list_handler(ctx: ToolContext, p: NamespaceScope) -> ToolResult {
    let builder = ctx
        .command("istioctl")
        .with_args(["waypoint", "list"])
        .with_args(p.args());
    run_command(&ctx, builder, "listing waypoints").await
}
