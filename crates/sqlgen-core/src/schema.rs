//! Schema document types.
//!
//! These are the shapes persisted by extraction and served by the catalog:
//! one [`TableSchema`] per table and a flat [`SchemaIndexEntry`] list.

use serde::{Deserialize, Serialize};

/// Module label used for tables whose name has no `_` prefix.
pub const COMMON_MODULE: &str = "COMMON";

/// Derive the module label of a table: the part before the first `_`,
/// upper-cased, or [`COMMON_MODULE`] when the name has no `_`.
pub fn module_for(table_name: &str) -> String {
    match table_name.split_once('_') {
        Some((prefix, _)) => prefix.to_uppercase(),
        None => COMMON_MODULE.to_string(),
    }
}

/// File stem of a table's document: the lower-cased name, or `None` when the
/// name cannot be used as a single path component.
pub fn document_key(table_name: &str) -> Option<String> {
    let key = table_name.to_lowercase();
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    (!invalid).then_some(key)
}

/// Name of the grouping document a module's tables are described in.
pub fn module_file_name(module: &str) -> String {
    format!("{}_SCHEMA.md", module)
}

/// Full description of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    #[serde(default)]
    pub comment: String,
    pub module: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a table schema with its module derived from the name.
    pub fn new(table_name: impl Into<String>, comment: impl Into<String>) -> Self {
        let table_name = table_name.into();
        let module = module_for(&table_name);
        Self {
            file_name: module_file_name(&module),
            comment: comment.into(),
            module,
            table_name,
            columns: Vec::new(),
        }
    }

    pub fn add_column(&mut self, column: ColumnSchema) {
        self.columns.push(column);
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Key under which the per-table document is stored.
    pub fn document_key(&self) -> Option<String> {
        document_key(&self.table_name)
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSchema {
    pub position: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub comment: String,
}

fn default_nullable() -> bool {
    true
}

/// Listing entry for one table, without column detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaIndexEntry {
    pub table_name: String,
    #[serde(default)]
    pub comment: String,
    pub module: String,
}

impl SchemaIndexEntry {
    pub fn new(table_name: impl Into<String>, comment: impl Into<String>) -> Self {
        let table_name = table_name.into();
        Self {
            module: module_for(&table_name),
            comment: comment.into(),
            table_name,
        }
    }

    /// Case-insensitive substring match on table name or comment.
    ///
    /// `needle` must already be lower-cased.
    pub fn matches(&self, needle: &str) -> bool {
        self.table_name.to_lowercase().contains(needle)
            || self.comment.to_lowercase().contains(needle)
    }
}

impl From<&TableSchema> for SchemaIndexEntry {
    fn from(table: &TableSchema) -> Self {
        Self {
            table_name: table.table_name.clone(),
            comment: table.comment.clone(),
            module: table.module.clone(),
        }
    }
}

/// Filter `entries` by a case-insensitive query on name or comment.
pub fn search_entries<'a>(
    entries: &'a [SchemaIndexEntry],
    query: &str,
) -> Vec<&'a SchemaIndexEntry> {
    let needle = query.to_lowercase();
    entries.iter().filter(|e| e.matches(&needle)).collect()
}
