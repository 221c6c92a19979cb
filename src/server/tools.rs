use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

use rmcp::{
    Error as McpError, ServerHandler,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool,
};

use crate::extract::Extractor;
use crate::schema::ServerRegistry;
use crate::source::Source;
use crate::store::ConfigStore;

type SharedStore = Arc<RwLock<ConfigStore>>;

/// MCP service exposing configuration extraction and installation as tools.
///
/// Every tool answers with the `{"mcpServers": ...}` or `{"error": ...}`
/// result shape as text content; recoverable failures never become protocol
/// errors.
#[derive(Clone)]
pub struct McpInstaller {
    pub store: SharedStore,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetConfigRequest {
    #[schemars(description = "GitHub repository URL, raw URL, local file path, or literal JSON")]
    pub source: String,

    #[schemars(description = "only return the named server from the configuration", default)]
    pub server: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InstallServerRequest {
    #[schemars(description = "GitHub repository URL, raw URL, local file path, or literal JSON")]
    pub source: String,

    #[schemars(description = "only install the named server from the configuration", default)]
    pub server: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListInstalledRequest {
    #[schemars(description = "only list the named server", default)]
    pub server: Option<String>,
}

#[tool(tool_box)]
impl McpInstaller {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve a source, extract its registry, and apply the optional
    /// single-server filter.
    async fn extract_from(source: &str, server: Option<&str>) -> crate::Result<ServerRegistry> {
        let resolved = Source::classify(source).resolve().await?;
        let registry = Extractor::new().extract(&resolved.text, resolved.kind)?;

        match server {
            Some(name) => registry.select(name),
            None => Ok(registry),
        }
    }

    #[tool(description = "Extract MCP server configuration from a source without installing it")]
    async fn get_config(
        &self,
        #[tool(aggr)] GetConfigRequest { source, server }: GetConfigRequest,
    ) -> Result<CallToolResult, McpError> {
        let result = match Self::extract_from(&source, server.as_deref()).await {
            Ok(registry) => registry.to_value(),
            Err(e) => e.to_value(),
        };

        Ok(CallToolResult::success(vec![Content::text(
            result.to_string(),
        )]))
    }

    #[tool(
        description = "Extract MCP server configuration from a source and merge it into the config store"
    )]
    async fn install_server(
        &self,
        #[tool(aggr)] InstallServerRequest { source, server }: InstallServerRequest,
    ) -> Result<CallToolResult, McpError> {
        let outcome = match Self::extract_from(&source, server.as_deref()).await {
            Ok(registry) => {
                let mut store = self.store.write().await;
                match store.install(&registry) {
                    Ok(()) => json!({
                        "success": true,
                        "installed": registry.names(),
                        "message": format!(
                            "added {} server(s) to {}",
                            registry.len(),
                            store.path().display()
                        ),
                    }),
                    Err(e) => e.to_value(),
                }
            }
            Err(e) => e.to_value(),
        };

        Ok(CallToolResult::success(vec![Content::text(
            outcome.to_string(),
        )]))
    }

    #[tool(description = "List the MCP servers currently present in the config store")]
    async fn list_installed(
        &self,
        #[tool(aggr)] ListInstalledRequest { server }: ListInstalledRequest,
    ) -> Result<CallToolResult, McpError> {
        let store = self.store.read().await;

        let result = match server.as_deref() {
            Some(name) => match store.registry().select(name) {
                Ok(registry) => registry.to_value(),
                Err(e) => e.to_value(),
            },
            None => store.registry().to_value(),
        };

        Ok(CallToolResult::success(vec![Content::text(
            result.to_string(),
        )]))
    }
}

#[tool(tool_box)]
impl ServerHandler for McpInstaller {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("This server extracts MCP server configurations from GitHub repositories, raw URLs, local files, or literal JSON. Use 'get_config' to preview an extracted configuration, 'install_server' to merge it into the config store, or 'list_installed' to inspect the store.".to_string()),
        }
    }
}
