//! # sqlgen-core
//!
//! Shared building blocks for the sqlgen MCP server:
//!
//! - [`config`]: YAML configuration
//! - [`dialect`]: SQL dialect detection and dialect-specific catalog queries
//! - [`schema`]: persisted table/index document types
//! - [`executor`]: the [`QueryExecutor`] capability every database adapter implements

pub mod config;
pub mod dialect;
pub mod executor;
pub mod schema;

pub use config::{ConfigError, McpConfig, QueryConfig, SchemaConfig, SqlgenConfig, UpstreamConfig};
pub use dialect::{Dialect, ExplainPlan};
pub use executor::{ExecutorError, QueryExecutor, Row};
pub use schema::{ColumnSchema, SchemaIndexEntry, TableSchema, document_key, module_for};
