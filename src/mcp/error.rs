//! Structured tool errors.

use std::error::Error as StdError;
use std::fmt;

use super::protocol::ToolsCallResult;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A tool failure that accumulates key/value context as it travels up.
///
/// Rendered as `message [key=value, ...]: source`.
#[derive(Debug)]
pub struct ToolError {
    message: String,
    context: Vec<(String, String)>,
    source: Option<BoxError>,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Attach a context pair. A repeated key keeps its first value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !self.context.iter().any(|(k, _)| *k == key) {
            self.context.push((key, value.into()));
        }
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// In-band error result carrying the full rendering.
    pub fn into_result(self) -> ToolsCallResult {
        ToolsCallResult::error(self.to_string())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for ToolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}
