//! CLI command implementations.

pub mod extract;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use sqlgen_adapter_pg::{PostgresExecutor, URL_SCHEME};
use sqlgen_core::SqlgenConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Load the config file, or defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<SqlgenConfig> {
    let (config, found) = SqlgenConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    if !found {
        warn!(config = %path.display(), "Config file not found, using defaults");
    }
    Ok(config)
}

/// Connect to the configured upstream database.
pub async fn connect(config: &SqlgenConfig) -> Result<Arc<PostgresExecutor>> {
    let executor = PostgresExecutor::connect(&config.upstream)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                config.upstream.redacted_connection_url(URL_SCHEME)
            )
        })?;
    Ok(Arc::new(executor))
}
