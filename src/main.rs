use anyhow::Result;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use mcp_install_rs::extract::Extractor;
use mcp_install_rs::server::McpInstaller;
use mcp_install_rs::source::Source;
use mcp_install_rs::store::ConfigStore;

#[cfg(feature = "trace")]
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Configuration source: GitHub repository URL, raw URL, local file path, or literal JSON
    source: Option<String>,
    /// Install only the named server from the extracted configuration
    #[clap(long)]
    server: Option<String>,
    /// Path of the MCP config store to update
    #[clap(long, default_value = "server_config.json")]
    config: PathBuf,
    /// Serve the installer as an MCP server over stdio instead of installing once
    #[clap(long)]
    serve: bool,
}

/// You can inspect the server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -p mcp-install-rs -- --serve

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if args.serve {
        serve(&args.config).await
    } else {
        install_once(&args).await
    }
}

async fn serve(config_path: &Path) -> Result<()> {
    // stdout carries the MCP transport, so logs go to a file
    #[cfg(feature = "trace")]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::fs::File::create("server.log")?)
        .with_ansi(false)
        .init();

    tracing::info!("Starting MCP install server");

    let store = ConfigStore::open(config_path);
    tracing::info!("Using config store at: {}", store.path().display());

    let service = McpInstaller::new(Arc::new(RwLock::new(store)))
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}

async fn install_once(args: &Cli) -> Result<()> {
    #[cfg(feature = "trace")]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let Some(source) = args.source.as_deref() else {
        anyhow::bail!("a configuration source is required unless --serve is given");
    };

    match install(source, args.server.as_deref(), &args.config).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_value())?);
            std::process::exit(1);
        }
    }
}

/// Resolve, extract, filter, and merge into the config store.
async fn install(
    source: &str,
    server: Option<&str>,
    config_path: &Path,
) -> mcp_install_rs::Result<Value> {
    let resolved = Source::classify(source).resolve().await?;
    let registry = Extractor::new().extract(&resolved.text, resolved.kind)?;

    let registry = match server {
        Some(name) => registry.select(name)?,
        None => registry,
    };

    let mut store = ConfigStore::open(config_path);
    store.install(&registry)?;

    tracing::info!(
        "Installed {} server(s) into {}",
        registry.len(),
        config_path.display()
    );
    Ok(registry.to_value())
}
