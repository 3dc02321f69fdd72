//! On-disk schema documents.
//!
//! Layout under the output directory:
//!
//! ```text
//! <dir>/schema_index.json              [{tableName, comment, module}, ...]
//! <dir>/tables/<lower(tableName)>.json {tableName, comment, module, fileName, columns}
//! ```
//!
//! Each file is written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written document.

use crate::error::McpError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlgen_core::{SchemaIndexEntry, TableSchema, document_key};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "schema_index.json";
pub const TABLES_DIR: &str = "tables";

#[derive(Debug, Clone)]
pub struct SchemaStore {
    root: PathBuf,
}

impl SchemaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Path of a table's document; the name is matched case-insensitively.
    ///
    /// `None` for names that would leave the tables directory.
    pub fn table_path(&self, table_name: &str) -> Option<PathBuf> {
        document_key(table_name).map(|key| self.document_path(&key))
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(TABLES_DIR).join(format!("{}.json", key))
    }

    /// Write every table document, then the index.
    ///
    /// The index is written last so it only ever lists tables whose
    /// documents exist. Documents of tables not in `tables` are left alone.
    /// Every name is checked before the first write.
    pub async fn write_all(&self, tables: &[TableSchema]) -> Result<(), McpError> {
        let mut documents = Vec::with_capacity(tables.len());
        for table in tables {
            let key = table
                .document_key()
                .ok_or_else(|| McpError::InvalidTableName(table.table_name.clone()))?;
            documents.push((self.document_path(&key), table));
        }

        tokio::fs::create_dir_all(self.root.join(TABLES_DIR)).await?;
        for (path, table) in documents {
            write_json_atomic(&path, table).await?;
        }

        let index: Vec<SchemaIndexEntry> = tables.iter().map(SchemaIndexEntry::from).collect();
        write_json_atomic(&self.index_path(), &index).await
    }

    /// Read the index; `None` when it has not been written yet.
    pub async fn read_index(&self) -> Result<Option<Vec<SchemaIndexEntry>>, McpError> {
        read_json(&self.index_path()).await
    }

    /// Read one table document; `None` when absent or not a storable name.
    pub async fn read_table(&self, table_name: &str) -> Result<Option<TableSchema>, McpError> {
        match self.table_path(table_name) {
            Some(path) => read_json(&path).await,
            None => Ok(None),
        }
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), McpError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, McpError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
