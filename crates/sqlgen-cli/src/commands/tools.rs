//! `sqlgen tools`: print the advertised tools without connecting anywhere.

use anyhow::Result;
use sqlgen_mcp::{Tool, ToolDefinition};
use std::path::Path;

/// Definitions the server would register for this configuration.
pub fn definitions(explain_enabled: bool) -> Vec<ToolDefinition> {
    Tool::ALL
        .into_iter()
        .filter(|t| explain_enabled || *t != Tool::ExplainQuery)
        .map(|t| t.definition())
        .collect()
}

pub fn list(config_path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    let tools = definitions(config.mcp.explain_enabled);
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
