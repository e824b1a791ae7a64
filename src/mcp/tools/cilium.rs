//! Cilium Tools
//!
//! Cluster-level operations go through the `cilium` CLI. The debug family
//! runs `cilium-dbg` inside an agent pod, which is resolved first:
//!
//! 1. [`resolve_cilium_pod`] asks `kubectl` for an agent pod, optionally on
//!    a given node.
//! 2. [`CiliumPod::dbg_command`] builds `kubectl exec <pod> -- cilium-dbg ...`
//!    from the resolved pod.

use serde::Deserialize;

use super::{failure, run_command};
use crate::exec::{CommandBuilder, ExecError};
use crate::mcp::context::ToolContext;
use crate::mcp::params::{flag, opt_number, NoParams, Param};
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};

const CILIUM_NAMESPACE: &str = "kube-system";
const CILIUM_AGENT_SELECTOR: &str = "k8s-app=cilium";

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        status_and_version_tool(),
        install_tool(),
        upgrade_tool(),
        connect_remote_cluster_tool(),
        disconnect_remote_cluster_tool(),
        clustermesh_status_tool(),
        toggle_hubble_tool(),
        bgp_peers_tool(),
        bgp_routes_tool(),
        endpoints_list_tool(),
        endpoint_details_tool(),
        daemon_status_tool(),
        configuration_options_tool(),
        service_list_tool(),
    ]
}

// ============================================================================
// Agent pod resolution
// ============================================================================

/// A Cilium agent pod to run debug commands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiliumPod {
    pub name: String,
}

impl CiliumPod {
    /// `kubectl exec <pod> -n kube-system -- cilium-dbg <args>`
    pub fn dbg_command<I, S>(&self, ctx: &ToolContext, args: I) -> CommandBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ctx.command("kubectl")
            .with_args(["exec", self.name.as_str(), "-n", CILIUM_NAMESPACE, "--", "cilium-dbg"])
            .with_args(args)
    }
}

/// Find a Cilium agent pod, on `node_name` when given.
pub async fn resolve_cilium_pod(
    ctx: &ToolContext,
    node_name: Option<&str>,
) -> Result<CiliumPod, ExecError> {
    let node_selector = node_name
        .filter(|n| !n.is_empty())
        .map(|n| format!("spec.nodeName={}", n));

    let builder = ctx
        .command("kubectl")
        .with_args(["get", "pods", "-n", CILIUM_NAMESPACE, "-l", CILIUM_AGENT_SELECTOR])
        .with_flag_value("--field-selector", node_selector)
        .with_args(["-o", "jsonpath={.items[0].metadata.name}"]);

    let output = builder.execute(ctx).await?;
    let name = output.trim();
    if name.is_empty() {
        let location = match node_name.filter(|n| !n.is_empty()) {
            Some(node) => format!(" on node {}", node),
            None => String::new(),
        };
        return Err(ExecError::failed(
            builder.invocation().display(),
            format!("no Cilium agent pod found{}", location),
        ));
    }

    Ok(CiliumPod {
        name: name.to_string(),
    })
}

/// Resolve the agent pod, then run `cilium-dbg` there.
async fn run_dbg(ctx: &ToolContext, node_name: Option<&str>, args: Vec<String>, doing: &str) -> ToolResult {
    let pod = match resolve_cilium_pod(ctx, node_name).await {
        Ok(pod) => pod,
        Err(e) => return Ok(failure("finding Cilium pod", e)),
    };
    run_command(ctx, pod.dbg_command(ctx, args), doing).await
}

const NODE_NAME: Param = Param::optional("node_name", "Node whose Cilium agent to query (default: any)");

// ============================================================================
// cilium_status_and_version
// ============================================================================

fn status_and_version_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_status_and_version")
        .description("Cilium status and version")
        .build(status_and_version_handler)
}

async fn status_and_version_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let status = match ctx.command("cilium").with_arg("status").execute(&ctx).await {
        Ok(output) => output,
        Err(e) => return Ok(failure("getting Cilium status", e)),
    };
    let version = match ctx.command("cilium").with_arg("version").execute(&ctx).await {
        Ok(output) => output,
        Err(e) => return Ok(failure("getting Cilium version", e)),
    };
    Ok(ToolsCallResult::text(format!("{}\n{}", status, version)))
}

// ============================================================================
// cilium_install / cilium_upgrade
// ============================================================================

#[derive(Debug, Deserialize)]
struct InstallParams {
    version: Option<String>,
    cluster_name: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    cluster_id: Option<u32>,
}

fn install_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_install")
        .description("Install Cilium into the cluster")
        .params(&[
            Param::optional("version", "Cilium version"),
            Param::optional("cluster_name", "Cluster name, needed for cluster mesh"),
            Param::optional("cluster_id", "Cluster ID (1-255), needed for cluster mesh").number(),
        ])
        .build(install_handler)
}

async fn install_handler(ctx: ToolContext, p: InstallParams) -> ToolResult {
    let builder = ctx
        .command("cilium")
        .with_arg("install")
        .with_flag_value("--version", p.version)
        .with_flag_value("--set", p.cluster_name.filter(|n| !n.is_empty()).map(|n| format!("cluster.name={}", n)))
        .with_flag_value("--set", p.cluster_id.map(|id| format!("cluster.id={}", id)));
    run_command(&ctx, builder, "installing Cilium").await
}

#[derive(Debug, Deserialize)]
struct UpgradeParams {
    version: Option<String>,
}

fn upgrade_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_upgrade")
        .description("Upgrade Cilium")
        .params(&[Param::optional("version", "Target Cilium version")])
        .build(upgrade_handler)
}

async fn upgrade_handler(ctx: ToolContext, p: UpgradeParams) -> ToolResult {
    let builder = ctx
        .command("cilium")
        .with_arg("upgrade")
        .with_flag_value("--version", p.version);
    run_command(&ctx, builder, "upgrading Cilium").await
}

// ============================================================================
// Cluster mesh
// ============================================================================

#[derive(Debug, Deserialize)]
struct RemoteClusterParams {
    cluster_name: String,
    context: Option<String>,
}

fn connect_remote_cluster_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_connect_to_remote_cluster")
        .description("Connect this cluster to a remote cluster mesh member")
        .params(&[
            Param::required("cluster_name", "Name of the destination cluster"),
            Param::optional("context", "Kubeconfig context of the destination cluster"),
        ])
        .build(connect_remote_cluster_handler)
}

async fn connect_remote_cluster_handler(ctx: ToolContext, p: RemoteClusterParams) -> ToolResult {
    let builder = ctx
        .command("cilium")
        .with_args(["clustermesh", "connect", "--destination-cluster", p.cluster_name.as_str()])
        .with_flag_value("--destination-context", p.context);
    run_command(&ctx, builder, "connecting to remote cluster").await
}

fn disconnect_remote_cluster_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_disconnect_remote_cluster")
        .description("Disconnect a remote cluster from the mesh")
        .params(&[
            Param::required("cluster_name", "Name of the destination cluster"),
            Param::optional("context", "Kubeconfig context of the destination cluster"),
        ])
        .build(disconnect_remote_cluster_handler)
}

async fn disconnect_remote_cluster_handler(ctx: ToolContext, p: RemoteClusterParams) -> ToolResult {
    let builder = ctx
        .command("cilium")
        .with_args(["clustermesh", "disconnect", "--destination-cluster", p.cluster_name.as_str()])
        .with_flag_value("--destination-context", p.context);
    run_command(&ctx, builder, "disconnecting remote cluster").await
}

fn clustermesh_status_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_show_cluster_mesh_status")
        .description("Cluster mesh connectivity status")
        .build(clustermesh_status_handler)
}

async fn clustermesh_status_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("cilium").with_args(["clustermesh", "status"]);
    run_command(&ctx, builder, "getting cluster mesh status").await
}

// ============================================================================
// cilium_toggle_hubble
// ============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ToggleHubbleParams {
    #[serde(default = "default_true", deserialize_with = "flag")]
    enable: bool,
}

fn toggle_hubble_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_toggle_hubble")
        .description("Enable or disable Hubble observability")
        .params(&[Param::optional("enable", "\"true\" to enable, \"false\" to disable (default: true)").flag()])
        .build(toggle_hubble_handler)
}

async fn toggle_hubble_handler(ctx: ToolContext, p: ToggleHubbleParams) -> ToolResult {
    let action = if p.enable { "enable" } else { "disable" };
    let builder = ctx.command("cilium").with_args(["hubble", action]);
    run_command(&ctx, builder, &format!("trying to {} Hubble", action)).await
}

// ============================================================================
// BGP
// ============================================================================

fn bgp_peers_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_list_bgp_peers")
        .description("BGP peering sessions of every node")
        .build(bgp_peers_handler)
}

async fn bgp_peers_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("cilium").with_args(["bgp", "peers"]);
    run_command(&ctx, builder, "listing BGP peers").await
}

fn bgp_routes_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_list_bgp_routes")
        .description("BGP routes advertised and learned")
        .build(bgp_routes_handler)
}

async fn bgp_routes_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("cilium").with_args(["bgp", "routes"]);
    run_command(&ctx, builder, "listing BGP routes").await
}

// ============================================================================
// Debug family (cilium-dbg inside an agent pod)
// ============================================================================

#[derive(Debug, Deserialize)]
struct NodeParams {
    node_name: Option<String>,
}

fn endpoints_list_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_get_endpoints_list")
        .description("Endpoints managed by a Cilium agent")
        .params(&[NODE_NAME])
        .build(endpoints_list_handler)
}

async fn endpoints_list_handler(ctx: ToolContext, p: NodeParams) -> ToolResult {
    let args = vec!["endpoint".to_string(), "list".to_string()];
    run_dbg(&ctx, p.node_name.as_deref(), args, "listing endpoints").await
}

#[derive(Debug, Deserialize)]
struct EndpointDetailsParams {
    endpoint_id: String,
    output: Option<String>,
    node_name: Option<String>,
}

fn endpoint_details_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_get_endpoint_details")
        .description("Details of one Cilium endpoint")
        .params(&[
            Param::required("endpoint_id", "Endpoint ID"),
            Param::optional("output", "Output format: json, yaml"),
            NODE_NAME,
        ])
        .build(endpoint_details_handler)
}

async fn endpoint_details_handler(ctx: ToolContext, p: EndpointDetailsParams) -> ToolResult {
    let mut args = vec!["endpoint".to_string(), "get".to_string(), p.endpoint_id];
    if let Some(output) = p.output.filter(|o| !o.is_empty()) {
        args.extend(["-o".to_string(), output]);
    }
    run_dbg(&ctx, p.node_name.as_deref(), args, "getting endpoint details").await
}

#[derive(Debug, Deserialize)]
struct DaemonStatusParams {
    #[serde(default, deserialize_with = "flag")]
    verbose: bool,
    node_name: Option<String>,
}

fn daemon_status_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_get_daemon_status")
        .description("Status of a Cilium agent")
        .params(&[
            Param::optional("verbose", "Detailed status (\"true\"/\"false\")").flag(),
            NODE_NAME,
        ])
        .build(daemon_status_handler)
}

async fn daemon_status_handler(ctx: ToolContext, p: DaemonStatusParams) -> ToolResult {
    let mut args = vec!["status".to_string()];
    if p.verbose {
        args.push("--verbose".to_string());
    }
    run_dbg(&ctx, p.node_name.as_deref(), args, "getting daemon status").await
}

#[derive(Debug, Deserialize)]
struct ConfigurationOptionsParams {
    #[serde(default, deserialize_with = "flag")]
    list_all: bool,
    node_name: Option<String>,
}

fn configuration_options_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_show_configuration_options")
        .description("Runtime configuration options of a Cilium agent")
        .params(&[
            Param::optional("list_all", "Include read-only options (\"true\"/\"false\")").flag(),
            NODE_NAME,
        ])
        .build(configuration_options_handler)
}

async fn configuration_options_handler(ctx: ToolContext, p: ConfigurationOptionsParams) -> ToolResult {
    let mut args = vec!["config".to_string()];
    if p.list_all {
        args.push("--all".to_string());
    }
    run_dbg(&ctx, p.node_name.as_deref(), args, "getting configuration options").await
}

#[derive(Debug, Deserialize)]
struct ServiceListParams {
    #[serde(default, deserialize_with = "flag")]
    show_cluster_mesh_affinity: bool,
    node_name: Option<String>,
}

fn service_list_tool() -> RegisteredTool {
    ToolBuilder::new("cilium_get_service_list")
        .description("Services load-balanced by a Cilium agent")
        .params(&[
            Param::optional(
                "show_cluster_mesh_affinity",
                "Show cluster mesh service affinity (\"true\"/\"false\")",
            )
            .flag(),
            NODE_NAME,
        ])
        .build(service_list_handler)
}

async fn service_list_handler(ctx: ToolContext, p: ServiceListParams) -> ToolResult {
    let mut args = vec!["service".to_string(), "list".to_string()];
    if p.show_cluster_mesh_affinity {
        args.push("--clustermesh-affinity".to_string());
    }
    run_dbg(&ctx, p.node_name.as_deref(), args, "listing services").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tools::test_support::{call, mock_context};
    use serde_json::json;

    const POD_LOOKUP: &[&str] = &[
        "get",
        "pods",
        "-n",
        "kube-system",
        "-l",
        "k8s-app=cilium",
        "-o",
        "jsonpath={.items[0].metadata.name}",
    ];

    #[tokio::test]
    async fn test_status_and_version_joins_outputs() {
        let (ctx, mock) = mock_context();
        mock.add_command_string("cilium", &["status"], "Cilium status: OK", None);
        mock.add_command_string("cilium", &["version"], "cilium version 1.14.0", None);

        let result = call(&tools(), "cilium_status_and_version", ctx, json!({})).await;
        assert!(!result.is_error);
        assert_eq!(
            result.joined_text(),
            "Cilium status: OK\ncilium version 1.14.0"
        );
        assert_eq!(mock.calls_to("cilium"), vec![vec!["status"], vec!["version"]]);
    }

    #[tokio::test]
    async fn test_status_failure_skips_version() {
        let (ctx, mock) = mock_context();
        mock.add_command_string("cilium", &["status"], "", Some("unable to reach cluster"));

        let result = call(&tools(), "cilium_status_and_version", ctx, json!({})).await;
        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "Error getting Cilium status: unable to reach cluster"
        );
        assert_eq!(mock.call_log().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_to_remote_cluster_argv() {
        let (ctx, mock) = mock_context();
        mock.add_partial_match_string("cilium", &["clustermesh", "connect"], "connected", None);

        let result = call(
            &tools(),
            "cilium_connect_to_remote_cluster",
            ctx,
            json!({"cluster_name": "my-cluster"}),
        )
        .await;
        assert!(!result.is_error);
        assert_eq!(
            mock.calls_to("cilium"),
            vec![vec!["clustermesh", "connect", "--destination-cluster", "my-cluster"]]
        );
    }

    #[tokio::test]
    async fn test_connect_to_remote_cluster_requires_name() {
        let (ctx, mock) = mock_context();
        let result = call(&tools(), "cilium_connect_to_remote_cluster", ctx, json!({})).await;
        assert!(result.is_error);
        assert_eq!(result.joined_text(), "cluster_name parameter is required");
        assert!(mock.call_log().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_hubble_defaults_to_enable() {
        let (ctx, mock) = mock_context();
        mock.add_partial_match_string("cilium", &["hubble"], "", None);

        call(&tools(), "cilium_toggle_hubble", ctx.clone(), json!({})).await;
        call(&tools(), "cilium_toggle_hubble", ctx, json!({"enable": "false"})).await;
        assert_eq!(
            mock.calls_to("cilium"),
            vec![vec!["hubble", "enable"], vec!["hubble", "disable"]]
        );
    }

    #[tokio::test]
    async fn test_debug_command_resolves_pod_first() {
        let (ctx, mock) = mock_context();
        mock.add_command_string("kubectl", POD_LOOKUP, "cilium-x7k2p", None);
        mock.add_command_string(
            "kubectl",
            &["exec", "cilium-x7k2p", "-n", "kube-system", "--", "cilium-dbg", "endpoint", "list"],
            "ENDPOINT POLICY",
            None,
        );

        let result = call(&tools(), "cilium_get_endpoints_list", ctx, json!({})).await;
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "ENDPOINT POLICY");

        let calls = mock.call_log();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, POD_LOOKUP);
        assert_eq!(calls[1].args[1], "cilium-x7k2p");
    }

    #[tokio::test]
    async fn test_debug_command_on_node() {
        let (ctx, mock) = mock_context();
        mock.add_partial_match_string("kubectl", &["get", "pods"], "cilium-node2\n", None);
        mock.add_partial_match_string("kubectl", &["exec"], "OK", None);

        call(
            &tools(),
            "cilium_get_daemon_status",
            ctx,
            json!({"node_name": "node-2", "verbose": "true"}),
        )
        .await;

        let calls = mock.calls_to("kubectl");
        assert!(calls[0]
            .windows(2)
            .any(|w| w == ["--field-selector", "spec.nodeName=node-2"]));
        assert_eq!(
            calls[1],
            vec!["exec", "cilium-node2", "-n", "kube-system", "--", "cilium-dbg", "status", "--verbose"]
        );
    }

    #[tokio::test]
    async fn test_missing_pod_fails_without_exec() {
        let (ctx, mock) = mock_context();
        mock.add_command_string("kubectl", POD_LOOKUP, "", None);

        let result = call(&tools(), "cilium_get_service_list", ctx, json!({})).await;
        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "Error finding Cilium pod: no Cilium agent pod found"
        );
        assert_eq!(mock.call_log().len(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_details_requires_id() {
        let (ctx, mock) = mock_context();
        let result = call(&tools(), "cilium_get_endpoint_details", ctx, json!({"output": "json"})).await;
        assert_eq!(result.joined_text(), "endpoint_id parameter is required");
        assert!(mock.call_log().is_empty());
    }
}
