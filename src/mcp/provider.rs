//! Tool providers.

use std::fmt;
use std::str::FromStr;

use super::registry::RegisteredTool;
use super::tools;

/// A named family of tools that can be enabled with `--tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolProvider {
    Utils,
    K8s,
    Helm,
    Istio,
    Cilium,
    Argo,
    Prometheus,
}

impl ToolProvider {
    pub const ALL: [ToolProvider; 7] = [
        ToolProvider::Utils,
        ToolProvider::K8s,
        ToolProvider::Helm,
        ToolProvider::Istio,
        ToolProvider::Cilium,
        ToolProvider::Argo,
        ToolProvider::Prometheus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolProvider::Utils => "utils",
            ToolProvider::K8s => "k8s",
            ToolProvider::Helm => "helm",
            ToolProvider::Istio => "istio",
            ToolProvider::Cilium => "cilium",
            ToolProvider::Argo => "argo",
            ToolProvider::Prometheus => "prometheus",
        }
    }

    pub fn tools(self) -> Vec<RegisteredTool> {
        match self {
            ToolProvider::Utils => tools::utils::tools(),
            ToolProvider::K8s => tools::k8s::tools(),
            ToolProvider::Helm => tools::helm::tools(),
            ToolProvider::Istio => tools::istio::tools(),
            ToolProvider::Cilium => tools::cilium::tools(),
            ToolProvider::Argo => tools::argo::tools(),
            ToolProvider::Prometheus => tools::prometheus::tools(),
        }
    }

    /// Resolve a `--tools` list. Empty means every provider; duplicates
    /// collapse and the result follows [`ToolProvider::ALL`] order.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ToolProvider>, UnknownProvider> {
        let mut selected = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let provider = name.parse::<ToolProvider>()?;
            if !selected.contains(&provider) {
                selected.push(provider);
            }
        }

        if selected.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        selected.sort();
        Ok(selected)
    }
}

impl fmt::Display for ToolProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool provider '{name}', valid providers: {}", valid_names())]
pub struct UnknownProvider {
    pub name: String,
}

fn valid_names() -> String {
    ToolProvider::ALL
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for ToolProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolProvider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProvider {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_empty_means_all() {
        let none: [&str; 0] = [];
        assert_eq!(ToolProvider::parse_list(&none).unwrap(), ToolProvider::ALL.to_vec());
        assert_eq!(ToolProvider::parse_list(&[""]).unwrap(), ToolProvider::ALL.to_vec());
    }

    #[test]
    fn test_parse_list_dedups_and_orders() {
        let parsed = ToolProvider::parse_list(&["helm", " cilium", "Helm"]).unwrap();
        assert_eq!(parsed, vec![ToolProvider::Helm, ToolProvider::Cilium]);
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let err = ToolProvider::parse_list(&["helm", "linkerd"]).unwrap_err();
        assert_eq!(err.name, "linkerd");
        assert!(err.to_string().contains("valid providers: utils, k8s"));
    }

    #[test]
    fn test_every_provider_has_tools_with_unique_names() {
        let mut names = std::collections::HashSet::new();
        for provider in ToolProvider::ALL {
            let tools = provider.tools();
            assert!(!tools.is_empty(), "{} has no tools", provider);
            for tool in tools {
                assert!(names.insert(tool.name.clone()), "duplicate tool {}", tool.name);
                assert!(!tool.description.is_empty(), "{} has no description", tool.name);
            }
        }
    }
}
