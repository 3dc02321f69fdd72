//! `sqlgen serve`: run the MCP server.

use anyhow::Result;
use sqlgen_mcp::McpServer;
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn run(config_path: &Path, port: Option<u16>, schema_dir: Option<PathBuf>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port {
        config.mcp.port = port;
    }
    if let Some(dir) = schema_dir {
        config.schema.output_dir = dir;
    }

    let executor = super::connect(&config).await?;
    info!(port = config.mcp.port, "Starting sqlgen");

    McpServer::new(config, executor).run().await?;
    Ok(())
}
