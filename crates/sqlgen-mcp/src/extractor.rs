//! Dialect-aware schema extraction.
//!
//! A run detects the dialect, lists the tables, introspects each table's
//! columns, and writes the documents through [`SchemaStore`]. All catalog
//! queries complete before anything is written, so a failed run leaves the
//! previous documents untouched.

use crate::error::McpError;
use crate::store::SchemaStore;
use serde::Serialize;
use serde_json::Value;
use sqlgen_core::executor::row_field;
use sqlgen_core::{
    ColumnSchema, Dialect, QueryExecutor, Row, SchemaIndexEntry, TableSchema, document_key,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Summary of a completed extraction run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub output_dir: PathBuf,
    pub dialect: Dialect,
    pub table_count: usize,
    /// Table count per module.
    pub modules: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct SchemaExtractor {
    executor: Arc<dyn QueryExecutor>,
    default_output_dir: PathBuf,
}

impl SchemaExtractor {
    pub fn new(executor: Arc<dyn QueryExecutor>, default_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            default_output_dir: default_output_dir.into(),
        }
    }

    pub fn default_output_dir(&self) -> &Path {
        &self.default_output_dir
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// The dialect, failing when it has no catalog queries.
    fn introspectable_dialect(&self) -> Result<Dialect, McpError> {
        let dialect = self.executor.dialect();
        if dialect.supports_introspection() {
            Ok(dialect)
        } else {
            Err(McpError::UnsupportedDialect(self.executor.driver_name()))
        }
    }

    /// List every table with its comment, straight from the catalog.
    pub async fn list_tables(&self) -> Result<Vec<SchemaIndexEntry>, McpError> {
        let dialect = self.introspectable_dialect()?;
        let sql = dialect
            .list_tables_sql()
            .ok_or_else(|| McpError::UnsupportedDialect(dialect.to_string()))?;
        let rows = self.executor.query(&sql).await?;
        let mut entries: Vec<SchemaIndexEntry> = rows
            .iter()
            .filter_map(table_from_row)
            .map(|(name, comment)| SchemaIndexEntry::new(name, comment))
            .collect();
        entries.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        Ok(entries)
    }

    /// Introspect a single table; `None` when the catalog does not know it.
    pub async fn extract_table(&self, table_name: &str) -> Result<Option<TableSchema>, McpError> {
        let dialect = self.introspectable_dialect()?;
        let name = dialect.normalize_identifier(table_name);
        let sql = dialect
            .lookup_table_sql(&name)
            .ok_or_else(|| McpError::UnsupportedDialect(dialect.to_string()))?;
        let rows = self.executor.query(&sql).await?;

        match rows.iter().find_map(table_from_row) {
            Some((name, comment)) => {
                let table = self.describe_table(dialect, name, comment).await?;
                Ok(Some(table))
            }
            None => Ok(None),
        }
    }

    /// Introspect every table, sorted by name.
    ///
    /// Tables whose names cannot be stored as a document file are skipped.
    pub async fn extract(&self) -> Result<(Dialect, Vec<TableSchema>), McpError> {
        let dialect = self.introspectable_dialect()?;
        tracing::info!(dialect = %dialect, "Starting schema extraction");

        let entries = self.list_tables().await?;
        let mut tables = Vec::with_capacity(entries.len());
        for entry in entries {
            if document_key(&entry.table_name).is_none() {
                tracing::warn!(table = %entry.table_name, "Skipping table with unstorable name");
                continue;
            }
            let table = self
                .describe_table(dialect, entry.table_name, entry.comment)
                .await?;
            tracing::debug!(
                table = %table.table_name,
                columns = table.columns.len(),
                "Introspected table"
            );
            tables.push(table);
        }
        Ok((dialect, tables))
    }

    /// Run a full extraction and persist it under `output_dir`
    /// (or the configured default).
    pub async fn extract_and_save(
        &self,
        output_dir: Option<&Path>,
    ) -> Result<ExtractionReport, McpError> {
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_dir.clone());

        let (dialect, tables) = self.extract().await.inspect_err(|e| {
            tracing::error!(error = %e, "Schema extraction failed");
        })?;

        SchemaStore::new(&output_dir).write_all(&tables).await?;

        let mut modules = BTreeMap::new();
        for table in &tables {
            *modules.entry(table.module.clone()).or_insert(0) += 1;
        }

        tracing::info!(
            output_dir = %output_dir.display(),
            tables = tables.len(),
            modules = modules.len(),
            "Schema extraction completed"
        );

        Ok(ExtractionReport {
            output_dir,
            dialect,
            table_count: tables.len(),
            modules,
        })
    }

    async fn describe_table(
        &self,
        dialect: Dialect,
        table_name: String,
        comment: String,
    ) -> Result<TableSchema, McpError> {
        let sql = dialect
            .list_columns_sql(&table_name)
            .ok_or_else(|| McpError::UnsupportedDialect(dialect.to_string()))?;
        let rows = self.executor.query(&sql).await?;

        let mut table = TableSchema::new(table_name, comment);
        for row in &rows {
            table.add_column(column_from_row(row));
        }
        Ok(table)
    }
}

fn table_from_row(row: &Row) -> Option<(String, String)> {
    let name = text(row_field(row, "TABLE_NAME"));
    if name.is_empty() {
        return None;
    }
    Some((name, text(row_field(row, "REMARK"))))
}

fn column_from_row(row: &Row) -> ColumnSchema {
    ColumnSchema {
        position: integer(row_field(row, "POS")).try_into().unwrap_or(0),
        name: text(row_field(row, "NAME")),
        data_type: text(row_field(row, "TYPE")),
        length: integer(row_field(row, "LEN")),
        is_primary_key: flag(row_field(row, "PK")),
        nullable: flag(row_field(row, "NULLABLE")),
        comment: text(row_field(row, "REMARK")),
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Catalogs spell booleans as `Y`/`N`, `YES`/`NO`, 0/1 or real booleans.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(
            s.trim().to_uppercase().as_str(),
            "Y" | "YES" | "TRUE" | "1"
        ),
        _ => false,
    }
}
