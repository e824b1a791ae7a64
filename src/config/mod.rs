mod file_config;

pub use file_config::{FileConfig, HttpFileConfig};

use crate::mcp::{ArgoCdEndpoint, ToolProvider};
use crate::transport::{HttpTransportConfig, RequestsLoggingLevel};
use anyhow::{bail, Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Port used when HTTP is selected without an explicit port.
pub const DEFAULT_HTTP_PORT: u16 = 8084;

/// Environment variable holding the ArgoCD bearer token.
pub const ARGOCD_TOKEN_ENV: &str = "ARGOCD_API_TOKEN";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub stdio: bool,
    pub http_port: u16,
    /// Deprecated `--port`.
    pub legacy_port: Option<u16>,
    pub http_read_timeout_sec: u64,
    pub http_write_timeout_sec: u64,
    pub http_shutdown_timeout_sec: u64,
    pub http_logging_level: RequestsLoggingLevel,
    pub tools: Vec<String>,
    pub kubeconfig: Option<PathBuf>,
    pub argocd_url: Option<String>,
    pub argocd_token: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            stdio: true,
            http_port: 0,
            legacy_port: None,
            http_read_timeout_sec: 10,
            http_write_timeout_sec: 0,
            http_shutdown_timeout_sec: 5,
            http_logging_level: RequestsLoggingLevel::default(),
            tools: Vec::new(),
            kubeconfig: None,
            argocd_url: None,
            argocd_token: None,
        }
    }
}

/// Which transport to run, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSelection {
    Stdio,
    Http { port: u16 },
}

/// HTTP wins when stdio was switched off or a non-zero port was given.
/// `--http-port` takes precedence over the deprecated `--port`.
pub fn select_transport(stdio: bool, http_port: u16, legacy_port: Option<u16>) -> TransportSelection {
    let port = match (http_port, legacy_port) {
        (0, Some(legacy)) => legacy,
        (port, _) => port,
    };

    if !stdio || port != 0 {
        TransportSelection::Http {
            port: if port == 0 { DEFAULT_HTTP_PORT } else { port },
        }
    } else {
        TransportSelection::Stdio
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    Stdio,
    Http(HttpTransportConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub transport: TransportConfig,
    /// Grace period for stopping the active transport.
    pub shutdown_timeout: Duration,
    pub providers: Vec<ToolProvider>,
    pub kubeconfig: Option<PathBuf>,
    pub argocd: Option<ArgoCdEndpoint>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let http_file = file.http.unwrap_or_default();

        let stdio = file.stdio.unwrap_or(cli.stdio);
        let http_port = match http_file.port {
            Some(port) => u16::try_from(port)
                .with_context(|| format!("http.port must be between 0 and 65535, got {}", port))?,
            None => cli.http_port,
        };

        if cli.legacy_port.is_some() {
            if http_port == 0 {
                warn!("--port is deprecated, use --http-port instead");
            } else {
                warn!("--port is deprecated and ignored because --http-port is set");
            }
        }

        let read_timeout_sec = http_file
            .read_timeout_sec
            .unwrap_or(cli.http_read_timeout_sec);
        let write_timeout_sec = http_file
            .write_timeout_sec
            .unwrap_or(cli.http_write_timeout_sec);
        let shutdown_timeout_sec = http_file
            .shutdown_timeout_sec
            .unwrap_or(cli.http_shutdown_timeout_sec);
        if read_timeout_sec == 0 {
            bail!("HTTP read timeout must be greater than 0");
        }
        if shutdown_timeout_sec == 0 {
            bail!("HTTP shutdown timeout must be greater than 0");
        }

        let logging_level = http_file.logging_level.unwrap_or(cli.http_logging_level);

        let bind_address = match http_file.bind_address {
            Some(addr) => addr
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid http.bind_address: {}", addr))?,
            None => HttpTransportConfig::default().bind_address,
        };

        let transport = match select_transport(stdio, http_port, cli.legacy_port) {
            TransportSelection::Stdio => TransportConfig::Stdio,
            TransportSelection::Http { port } => TransportConfig::Http(HttpTransportConfig {
                bind_address,
                port,
                read_timeout: Duration::from_secs(read_timeout_sec),
                write_timeout: Duration::from_secs(write_timeout_sec),
                shutdown_timeout: Duration::from_secs(shutdown_timeout_sec),
                logging_level,
            }),
        };

        let tools = file.tools.unwrap_or_else(|| cli.tools.clone());
        let providers = ToolProvider::parse_list(tools.as_slice())?;

        let kubeconfig = file
            .kubeconfig
            .map(PathBuf::from)
            .or_else(|| cli.kubeconfig.clone());

        let argocd = file
            .argocd_url
            .or_else(|| cli.argocd_url.clone())
            .filter(|url| !url.is_empty())
            .map(|url| ArgoCdEndpoint {
                url,
                token: cli.argocd_token.clone().filter(|t| !t.is_empty()),
            });

        Ok(Self {
            transport,
            shutdown_timeout: Duration::from_secs(shutdown_timeout_sec),
            providers,
            kubeconfig,
            argocd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_is_the_default() {
        assert_eq!(select_transport(true, 0, None), TransportSelection::Stdio);
    }

    #[test]
    fn test_disabling_stdio_selects_http_on_default_port() {
        assert_eq!(
            select_transport(false, 0, None),
            TransportSelection::Http { port: 8084 }
        );
    }

    #[test]
    fn test_explicit_port_selects_http_even_with_stdio() {
        assert_eq!(
            select_transport(true, 9000, None),
            TransportSelection::Http { port: 9000 }
        );
    }

    #[test]
    fn test_legacy_port_only_when_http_port_unset() {
        assert_eq!(
            select_transport(true, 0, Some(7000)),
            TransportSelection::Http { port: 7000 }
        );
        assert_eq!(
            select_transport(true, 9000, Some(7000)),
            TransportSelection::Http { port: 9000 }
        );
        assert_eq!(select_transport(true, 0, Some(0)), TransportSelection::Stdio);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = AppConfig::resolve(&CliConfig::default(), None).unwrap();
        assert_eq!(config.transport, TransportConfig::Stdio);
        assert_eq!(config.providers, ToolProvider::ALL.to_vec());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.argocd.is_none());
    }

    #[test]
    fn test_file_overrides_cli() {
        let cli = CliConfig {
            http_port: 9000,
            tools: vec!["helm".to_string()],
            ..Default::default()
        };
        let file = FileConfig::parse(
            r#"
            tools = ["k8s"]
            [http]
            port = 9100
            bind_address = "127.0.0.1"
            write_timeout_sec = 30
            "#,
        )
        .unwrap();

        let config = AppConfig::resolve(&cli, Some(file)).unwrap();
        assert_eq!(config.providers, vec![ToolProvider::K8s]);
        let TransportConfig::Http(http) = config.transport else {
            panic!("expected HTTP transport");
        };
        assert_eq!(http.port, 9100);
        assert_eq!(http.bind_address.to_string(), "127.0.0.1");
        assert_eq!(http.read_timeout, Duration::from_secs(10));
        assert_eq!(http.write_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_file_port_out_of_range() {
        let file = FileConfig::parse("[http]\nport = 70000").unwrap();
        let err = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap_err();
        assert!(err.to_string().contains("between 0 and 65535"));
    }

    #[test]
    fn test_zero_read_timeout_rejected() {
        let cli = CliConfig {
            http_read_timeout_sec: 0,
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_unknown_provider_is_fatal() {
        let cli = CliConfig {
            tools: vec!["k8s".to_string(), "kafka".to_string()],
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.to_string().contains("kafka"));
        assert!(err.to_string().contains("prometheus"));
    }

    #[test]
    fn test_argocd_needs_url() {
        let cli = CliConfig {
            argocd_token: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli, None).unwrap().argocd.is_none());

        let cli = CliConfig {
            argocd_url: Some("https://argocd.example".to_string()),
            ..cli
        };
        let argocd = AppConfig::resolve(&cli, None).unwrap().argocd.unwrap();
        assert_eq!(argocd.url, "https://argocd.example");
        assert_eq!(argocd.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_logging_level_from_file_wins() {
        let file = FileConfig::parse("stdio = false\n[http]\nlogging_level = \"body\"").unwrap();
        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();
        match config.transport {
            TransportConfig::Http(http) => assert_eq!(http.logging_level, RequestsLoggingLevel::Body),
            TransportConfig::Stdio => panic!("expected the HTTP transport"),
        }
    }
}
