//! Schema extraction, catalog and query policy configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where schema documents are written and how the catalog serves them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Directory holding `schema_index.json` and `tables/`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Serve from live catalog queries when persisted documents are missing.
    #[serde(default = "default_true")]
    pub live_fallback: bool,

    /// Number of tables returned by a live table listing.
    #[serde(default = "default_live_page_size")]
    pub live_page_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            live_fallback: true,
            live_page_size: default_live_page_size(),
        }
    }
}

/// Read-query guardrails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Row limit appended to read queries that carry none.
    #[serde(default = "default_row_limit")]
    pub default_row_limit: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_row_limit: default_row_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs/schema")
}

fn default_live_page_size() -> usize {
    100
}

fn default_row_limit() -> u64 {
    1000
}
