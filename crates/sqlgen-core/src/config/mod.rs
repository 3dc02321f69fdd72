//! Configuration types for sqlgen.
//!
//! Configuration is loaded from a single YAML file (`sqlgen.yaml` by default).
//! Every section is optional and falls back to its defaults.
//!
//! # Sections
//!
//! - **upstream**: database connection
//! - **mcp**: HTTP listener, handshake identity, push delivery
//! - **schema**: extraction output directory and catalog fallback policy
//! - **query**: read-query row limit

pub mod mcp;
pub mod schema;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use mcp::McpConfig;
pub use schema::{QueryConfig, SchemaConfig};
pub use upstream::{ConnectionPoolConfig, UpstreamConfig};

/// Complete sqlgen configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlgenConfig {
    /// Upstream database connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// MCP server settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Schema document settings.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Query guardrails.
    #[serde(default)]
    pub query: QueryConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlgenConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// The boolean is `true` when the file was found.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.default_row_limit == 0 {
            return Err(ConfigError::Config(
                "query.default_row_limit must be greater than zero".to_string(),
            ));
        }
        if self.schema.live_page_size == 0 {
            return Err(ConfigError::Config(
                "schema.live_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = SqlgenConfig::from_yaml("{}").unwrap();
        assert_eq!(config.mcp.port, 7070);
        assert_eq!(config.schema.output_dir, Path::new("docs/schema"));
        assert_eq!(config.query.default_row_limit, 1000);
        assert!(config.schema.live_fallback);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
upstream:
  host: db.internal
  database: erp
mcp:
  port: 9000
  explain_enabled: false
schema:
  output_dir: /var/lib/sqlgen/schema
query:
  default_row_limit: 50
"#;
        let config = SqlgenConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.upstream.host, "db.internal");
        assert_eq!(config.upstream.port, None);
        assert_eq!(config.upstream.database.as_deref(), Some("erp"));
        assert_eq!(config.mcp.port, 9000);
        assert!(!config.mcp.explain_enabled);
        assert_eq!(config.query.default_row_limit, 50);
    }

    #[test]
    fn test_zero_row_limit_rejected() {
        let err = SqlgenConfig::from_yaml("query:\n  default_row_limit: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn test_example_config_parses() {
        let yaml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../sqlgen.example.yaml"));
        let config = SqlgenConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.upstream.pool.max_connections, 10);
        assert_eq!(config.upstream.port, Some(5432));
        assert_eq!(
            config.mcp.command_endpoint("abc"),
            "http://localhost:7070/messages?sessionId=abc"
        );
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, found) = SqlgenConfig::load_or_default(dir.path().join("nope.yaml")).unwrap();
        assert!(!found);
        assert_eq!(config.mcp.server_name, "sqlgen-mcp");
    }
}
