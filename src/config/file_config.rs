use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::transport::RequestsLoggingLevel;

/// Values read from the optional `--config` TOML file. Anything present here
/// wins over the matching command line flag.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub stdio: Option<bool>,
    pub tools: Option<Vec<String>>,
    pub kubeconfig: Option<String>,
    pub argocd_url: Option<String>,

    pub http: Option<HttpFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct HttpFileConfig {
    pub bind_address: Option<String>,
    // Wider than u16 so out-of-range values get a readable error.
    pub port: Option<i64>,
    pub read_timeout_sec: Option<u64>,
    pub write_timeout_sec: Option<u64>,
    pub shutdown_timeout_sec: Option<u64>,
    /// One of `none`, `path`, `headers`, `body`.
    pub logging_level: Option<RequestsLoggingLevel>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
