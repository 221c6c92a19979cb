use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

use crate::error::{InstallError, Result};

/// Canonical top-level key for persisted and returned configurations.
pub const MCP_SERVERS_KEY: &str = "mcpServers";

/// Top-level key of the alternate input schema (`{"mcp": {"servers": {...}}}`).
pub const ALTERNATE_KEY: &str = "mcp";

/// Nested key of the alternate input schema.
pub const ALTERNATE_SERVERS_KEY: &str = "servers";

/// Launch specification for a single MCP server.
///
/// Keys beyond `command`, `args`, and `env` are collected in `extra` so that
/// configurations using fields this tool does not know about survive a
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerConfig {
    /// Create a launch spec from a command and its arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            extra: Map::new(),
        }
    }

    /// Serialize into the raw JSON object stored in a registry.
    pub fn to_value(&self) -> Value {
        // A struct of strings and maps always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Typed view of a raw registry entry.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| InstallError::Parse(format!("invalid server entry: {e}")))
    }
}

/// Mapping from server name to its launch specification.
///
/// Entries are kept as raw JSON objects so that heuristically extracted
/// configurations pass through without losing unknown fields. Insertion
/// order is preserved through serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerRegistry {
    entries: Map<String, Value>,
}

impl ServerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert a server entry; an existing entry with the same name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, config: Value) {
        self.entries.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Server names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Reduce the registry to the single named server.
    ///
    /// Returns a one-entry registry, or `NotFound` naming the missing server.
    pub fn select(&self, name: &str) -> Result<ServerRegistry> {
        match self.entries.get(name) {
            Some(config) => {
                let mut entries = Map::new();
                entries.insert(name.to_string(), config.clone());
                Ok(ServerRegistry { entries })
            }
            None => Err(InstallError::NotFound(name.to_string())),
        }
    }

    /// Render the canonical `{"mcpServers": {...}}` shape.
    pub fn to_value(&self) -> Value {
        json!({ MCP_SERVERS_KEY: self.entries })
    }
}

/// Normalize a parsed JSON document into the canonical registry.
///
/// Recognizes the canonical `mcpServers` key and the alternate
/// `mcp.servers` nesting; anything else is a schema error. The input is
/// not mutated.
pub fn normalize(value: &Value) -> Result<ServerRegistry> {
    if let Some(servers) = value.get(MCP_SERVERS_KEY) {
        return registry_from(servers);
    }
    if let Some(servers) = value
        .get(ALTERNATE_KEY)
        .and_then(|m| m.get(ALTERNATE_SERVERS_KEY))
    {
        return registry_from(servers);
    }
    Err(InstallError::Schema(
        "no 'mcpServers' or 'mcp.servers' section present".to_string(),
    ))
}

fn registry_from(servers: &Value) -> Result<ServerRegistry> {
    match servers.as_object() {
        Some(map) => Ok(ServerRegistry {
            entries: map.clone(),
        }),
        None => Err(InstallError::Schema(
            "configuration section is not an object".to_string(),
        )),
    }
}
