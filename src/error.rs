use serde_json::{Value, json};
use thiserror::Error;

/// Errors produced while resolving, extracting, or installing MCP server
/// configurations. Every variant is recoverable at the boundary: callers
/// render it as an `{"error": ...}` result instead of aborting.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A source could not be fetched or read.
    #[error("failed to fetch source: {0}")]
    Fetch(String),

    /// The input parsed, but no recognized configuration key was found.
    #[error("no MCP configuration found: {0}")]
    Schema(String),

    /// No extraction strategy produced valid structured data.
    #[error("invalid MCP configuration: {0}")]
    Parse(String),

    /// A named server is absent from an otherwise valid registry.
    #[error("server '{0}' not found in the configuration")]
    NotFound(String),

    /// The config store could not be read or written.
    #[error("config store error: {0}")]
    Persistence(String),
}

impl InstallError {
    /// Render this error as the `{"error": ...}` result shape.
    pub fn to_value(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
