use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cluster_tools_server::config::{self, TransportConfig};
use cluster_tools_server::server;
use cluster_tools_server::transport::RequestsLoggingLevel;

/// A blocked stdin read cannot be interrupted, so the runtime gets this long
/// to wind down before the process exits anyway.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = env!("SERVER_VERSION"), about = "MCP server for Kubernetes cluster tooling")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Deprecated, use --http-port.
    #[clap(long, hide = true)]
    pub port: Option<u16>,

    /// Port for the HTTP transport. A non-zero value selects HTTP.
    #[clap(long, default_value_t = 0)]
    pub http_port: u16,

    /// Seconds allowed for receiving a request body.
    #[clap(long, default_value_t = 10)]
    pub http_read_timeout: u64,

    /// Seconds allowed for producing a response, 0 for no limit.
    #[clap(long, default_value_t = 0)]
    pub http_write_timeout: u64,

    /// Seconds granted to in-flight work on shutdown.
    #[clap(long, default_value_t = 5)]
    pub http_shutdown_timeout: u64,

    /// Serve over stdin/stdout. Use --stdio=false to switch to HTTP.
    #[clap(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        default_value_t = true
    )]
    pub stdio: bool,

    /// Comma separated tool providers to enable. Empty enables all of them.
    #[clap(long, value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Kubeconfig passed to kubectl, helm, istioctl and cilium.
    #[clap(long, value_parser = parse_path)]
    pub kubeconfig: Option<PathBuf>,

    /// Default log level. The LOG_LEVEL environment variable takes precedence.
    #[clap(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// The level of logging to perform on each HTTP request.
    #[clap(long, default_value = "path")]
    pub http_logging_level: RequestsLoggingLevel,

    /// ArgoCD API base URL. The token is read from ARGOCD_API_TOKEN.
    #[clap(long)]
    pub argocd_url: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            stdio: args.stdio,
            http_port: args.http_port,
            legacy_port: args.port,
            http_read_timeout_sec: args.http_read_timeout,
            http_write_timeout_sec: args.http_write_timeout,
            http_shutdown_timeout_sec: args.http_shutdown_timeout,
            http_logging_level: args.http_logging_level,
            tools: args.tools.clone(),
            kubeconfig: args.kubeconfig.clone(),
            argocd_url: args.argocd_url.clone(),
            argocd_token: std::env::var(config::ARGOCD_TOKEN_ENV).ok(),
        }
    }
}

fn init_logging(default_level: LevelFilter) -> Result<()> {
    // stdout carries the stdio protocol, so logs always go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")
}

async fn run(cli_args: CliArgs) -> Result<()> {
    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    match &app_config.transport {
        TransportConfig::Stdio => info!("  transport: stdio"),
        TransportConfig::Http(http) => {
            info!("  transport: http on {}:{}", http.bind_address, http.port)
        }
    }
    info!(
        "  providers: {}",
        app_config
            .providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(",")
    );
    if let Some(kubeconfig) = &app_config.kubeconfig {
        info!("  kubeconfig: {:?}", kubeconfig);
    }
    if let Some(argocd) = &app_config.argocd {
        info!(
            "  argocd: {} (token {})",
            argocd.url,
            if argocd.token.is_some() { "set" } else { "not set" }
        );
    }

    server::run(app_config).await
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.log_level)?;

    info!(
        "cluster-tools-server {} starting",
        env!("SERVER_VERSION")
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli_args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match &result {
        Ok(()) => info!("Server stopped"),
        Err(e) => error!("Fatal error: {:#}", e),
    }
    result
}
