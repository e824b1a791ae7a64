//! Helm Tools

use std::time::Duration;

use serde::Deserialize;

use super::{run_command, split_list};
use crate::mcp::context::ToolContext;
use crate::mcp::error::ToolError;
use crate::mcp::params::{flag, NoParams, Param};
use crate::mcp::protocol::ToolsCallResult;
use crate::mcp::registry::{RegisteredTool, ToolBuilder, ToolResult};

/// Upper bound for `helm upgrade`, which can block on hooks.
const UPGRADE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn tools() -> Vec<RegisteredTool> {
    vec![
        list_releases_tool(),
        get_release_tool(),
        upgrade_release_tool(),
        uninstall_tool(),
        repo_add_tool(),
        repo_update_tool(),
    ]
}

// ============================================================================
// helm_list_releases
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListReleasesParams {
    namespace: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    all_namespaces: bool,
    filter: Option<String>,
    output: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    deployed: bool,
    #[serde(default, deserialize_with = "flag")]
    failed: bool,
    #[serde(default, deserialize_with = "flag")]
    pending: bool,
}

fn list_releases_tool() -> RegisteredTool {
    ToolBuilder::new("helm_list_releases")
        .description("List Helm releases")
        .params(&[
            Param::optional("namespace", "Namespace to list releases from"),
            Param::optional("all_namespaces", "List releases across all namespaces (\"true\"/\"false\")").flag(),
            Param::optional("filter", "Regular expression on release names"),
            Param::optional("output", "Output format: table, json, yaml"),
            Param::optional("deployed", "Only deployed releases (\"true\"/\"false\")").flag(),
            Param::optional("failed", "Only failed releases (\"true\"/\"false\")").flag(),
            Param::optional("pending", "Only pending releases (\"true\"/\"false\")").flag(),
        ])
        .build(list_releases_handler)
}

async fn list_releases_handler(ctx: ToolContext, p: ListReleasesParams) -> ToolResult {
    let builder = ctx
        .command("helm")
        .with_arg("list")
        .with_flag_value("-n", p.namespace)
        .with_flag("-A", p.all_namespaces)
        .with_flag_value("--filter", p.filter)
        .with_flag_value("-o", p.output)
        .with_flag("--deployed", p.deployed)
        .with_flag("--failed", p.failed)
        .with_flag("--pending", p.pending);
    run_command(&ctx, builder, "listing Helm releases").await
}

// ============================================================================
// helm_get_release
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetReleaseParams {
    name: String,
    namespace: String,
    resource: Option<String>,
}

fn get_release_tool() -> RegisteredTool {
    ToolBuilder::new("helm_get_release")
        .description("Get details of a Helm release")
        .params(&[
            Param::required("name", "Release name"),
            Param::required("namespace", "Release namespace"),
            Param::optional("resource", "all, values, manifest, notes or hooks (default: all)"),
        ])
        .build(get_release_handler)
}

async fn get_release_handler(ctx: ToolContext, p: GetReleaseParams) -> ToolResult {
    let resource = p
        .resource
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "all".to_string());
    let builder = ctx
        .command("helm")
        .with_args(["get", resource.as_str(), p.name.as_str(), "-n", p.namespace.as_str()]);
    run_command(&ctx, builder, "getting Helm release").await
}

// ============================================================================
// helm_upgrade_release
// ============================================================================

#[derive(Debug, Deserialize)]
struct UpgradeReleaseParams {
    name: String,
    chart: String,
    namespace: String,
    version: Option<String>,
    values: Option<String>,
    set: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    install: bool,
    #[serde(default, deserialize_with = "flag")]
    create_namespace: bool,
    #[serde(default, deserialize_with = "flag")]
    dry_run: bool,
    #[serde(default, deserialize_with = "flag")]
    wait: bool,
}

fn upgrade_release_tool() -> RegisteredTool {
    ToolBuilder::new("helm_upgrade_release")
        .description("Upgrade (or install) a Helm release")
        .params(&[
            Param::required("name", "Release name"),
            Param::required("chart", "Chart reference, e.g. bitnami/nginx"),
            Param::required("namespace", "Release namespace"),
            Param::optional("version", "Chart version"),
            Param::optional("values", "Path to a values file"),
            Param::optional("set", "Comma separated key=value overrides"),
            Param::optional("install", "Install if the release does not exist (\"true\"/\"false\")").flag(),
            Param::optional("create_namespace", "Create the namespace if missing (\"true\"/\"false\")").flag(),
            Param::optional("dry_run", "Simulate the upgrade (\"true\"/\"false\")").flag(),
            Param::optional("wait", "Wait for resources to be ready (\"true\"/\"false\")").flag(),
        ])
        .build(upgrade_release_handler)
}

async fn upgrade_release_handler(ctx: ToolContext, p: UpgradeReleaseParams) -> ToolResult {
    let mut builder = ctx
        .command("helm")
        .with_args(["upgrade", p.name.as_str(), p.chart.as_str(), "-n", p.namespace.as_str()])
        .with_flag("--install", p.install)
        .with_flag_value("--version", p.version.as_deref())
        .with_flag_value("-f", p.values.as_deref());
    for pair in p.set.as_deref().map(split_list).unwrap_or_default() {
        builder = builder.with_args(["--set".to_string(), pair]);
    }
    let builder = builder
        .with_flag("--create-namespace", p.create_namespace)
        .with_flag("--wait", p.wait)
        .with_flag("--dry-run", p.dry_run)
        .with_timeout(UPGRADE_TIMEOUT);

    match builder.execute(&ctx).await {
        Ok(output) => Ok(ToolsCallResult::text(output)),
        Err(e) => {
            let helm_args = builder.invocation().args.join(" ");
            Ok(ToolError::new("Error upgrading Helm release")
                .with_context("namespace", p.namespace)
                .with_context("helm_operation", "upgrade")
                .with_context("helm_args", helm_args)
                .with_source(e)
                .into_result())
        }
    }
}

// ============================================================================
// helm_uninstall
// ============================================================================

#[derive(Debug, Deserialize)]
struct UninstallParams {
    name: String,
    namespace: String,
    #[serde(default, deserialize_with = "flag")]
    dry_run: bool,
}

fn uninstall_tool() -> RegisteredTool {
    ToolBuilder::new("helm_uninstall")
        .description("Uninstall a Helm release")
        .params(&[
            Param::required("name", "Release name"),
            Param::required("namespace", "Release namespace"),
            Param::optional("dry_run", "Simulate the uninstall (\"true\"/\"false\")").flag(),
        ])
        .build(uninstall_handler)
}

async fn uninstall_handler(ctx: ToolContext, p: UninstallParams) -> ToolResult {
    let builder = ctx
        .command("helm")
        .with_args(["uninstall", p.name.as_str(), "-n", p.namespace.as_str()])
        .with_flag("--dry-run", p.dry_run);
    run_command(&ctx, builder, "uninstalling Helm release").await
}

// ============================================================================
// helm_repo_add / helm_repo_update
// ============================================================================

#[derive(Debug, Deserialize)]
struct RepoAddParams {
    name: String,
    url: String,
}

fn repo_add_tool() -> RegisteredTool {
    ToolBuilder::new("helm_repo_add")
        .description("Add a Helm chart repository")
        .params(&[
            Param::required("name", "Repository name"),
            Param::required("url", "Repository URL"),
        ])
        .build(repo_add_handler)
}

async fn repo_add_handler(ctx: ToolContext, p: RepoAddParams) -> ToolResult {
    let builder = ctx
        .command("helm")
        .with_args(["repo", "add", p.name.as_str(), p.url.as_str()]);
    run_command(&ctx, builder, "adding Helm repository").await
}

fn repo_update_tool() -> RegisteredTool {
    ToolBuilder::new("helm_repo_update")
        .description("Update information of available charts")
        .build(repo_update_handler)
}

async fn repo_update_handler(ctx: ToolContext, _p: NoParams) -> ToolResult {
    let builder = ctx.command("helm").with_args(["repo", "update"]);
    run_command(&ctx, builder, "updating Helm repositories").await
}
