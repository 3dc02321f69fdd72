//! Read side of the schema documents.
//!
//! The index is loaded on first use and kept in memory until [`SchemaCatalog::reload`].
//! Table documents are read from disk on every lookup. When no documents
//! exist and `live_fallback` is enabled, lookups go to the database catalog.

use crate::error::McpError;
use crate::extractor::SchemaExtractor;
use crate::store::SchemaStore;
use sqlgen_core::schema::search_entries;
use sqlgen_core::{SchemaConfig, SchemaIndexEntry, TableSchema};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Text returned in place of a table list when nothing can be served.
pub const NO_INDEX_MESSAGE: &str = "No schema index found.";

#[derive(Debug, Clone)]
enum IndexState {
    Unloaded,
    Missing,
    Loaded(Arc<Vec<SchemaIndexEntry>>),
}

pub struct SchemaCatalog {
    store: SchemaStore,
    extractor: SchemaExtractor,
    live_fallback: bool,
    live_page_size: usize,
    index: RwLock<IndexState>,
}

impl SchemaCatalog {
    pub fn new(config: &SchemaConfig, extractor: SchemaExtractor) -> Self {
        Self {
            store: SchemaStore::new(&config.output_dir),
            extractor,
            live_fallback: config.live_fallback,
            live_page_size: config.live_page_size,
            index: RwLock::new(IndexState::Unloaded),
        }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// The cached index, loading it on first access.
    ///
    /// An unreadable index is logged and treated as absent.
    pub async fn index(&self) -> Option<Arc<Vec<SchemaIndexEntry>>> {
        if let Some(state) = self.cached().await {
            return state;
        }

        let mut guard = self.index.write().await;
        if let IndexState::Unloaded = *guard {
            *guard = match self.store.read_index().await {
                Ok(Some(entries)) => {
                    tracing::info!(
                        path = %self.store.index_path().display(),
                        tables = entries.len(),
                        "Loaded schema index"
                    );
                    IndexState::Loaded(Arc::new(entries))
                }
                Ok(None) => {
                    tracing::info!(
                        path = %self.store.index_path().display(),
                        "No schema index on disk"
                    );
                    IndexState::Missing
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read schema index");
                    IndexState::Missing
                }
            };
        }
        match &*guard {
            IndexState::Loaded(entries) => Some(entries.clone()),
            _ => None,
        }
    }

    async fn cached(&self) -> Option<Option<Arc<Vec<SchemaIndexEntry>>>> {
        match &*self.index.read().await {
            IndexState::Unloaded => None,
            IndexState::Missing => Some(None),
            IndexState::Loaded(entries) => Some(Some(entries.clone())),
        }
    }

    /// Drop the cached index and read it again.
    pub async fn reload(&self) {
        *self.index.write().await = IndexState::Unloaded;
        self.index().await;
    }

    /// All tables, or `None` when there is no index and no live fallback.
    ///
    /// Live listings are capped at `live_page_size` entries.
    pub async fn list(&self) -> Result<Option<Vec<SchemaIndexEntry>>, McpError> {
        if let Some(entries) = self.index().await {
            return Ok(Some(entries.as_ref().clone()));
        }
        if !self.live_fallback {
            return Ok(None);
        }

        let mut entries = self.extractor.list_tables().await?;
        entries.truncate(self.live_page_size);
        Ok(Some(entries))
    }

    /// Entries whose name or comment contains `query`, ignoring case.
    pub async fn search(&self, query: &str) -> Result<Vec<SchemaIndexEntry>, McpError> {
        if let Some(entries) = self.index().await {
            return Ok(search_entries(&entries, query).into_iter().cloned().collect());
        }
        if !self.live_fallback {
            return Ok(Vec::new());
        }

        let entries = self.extractor.list_tables().await?;
        Ok(search_entries(&entries, query).into_iter().cloned().collect())
    }

    /// The document for `table_name`, matched case-insensitively.
    pub async fn get_table_schema(&self, table_name: &str) -> Result<TableSchema, McpError> {
        match self.store.read_table(table_name).await {
            Ok(Some(table)) => return Ok(table),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(table = %table_name, error = %e, "Unreadable table document");
            }
        }

        if self.live_fallback
            && self.extractor.dialect().supports_introspection()
            && let Some(table) = self.extractor.extract_table(table_name).await?
        {
            return Ok(table);
        }
        Err(McpError::TableNotFound(table_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlgen_core::executor::testing::ScriptedExecutor;
    use std::path::Path;

    fn config(dir: &Path, live_fallback: bool) -> SchemaConfig {
        SchemaConfig {
            output_dir: dir.to_path_buf(),
            live_fallback,
            live_page_size: 1,
        }
    }

    fn live_catalog() -> ScriptedExecutor {
        ScriptedExecutor::new("PostgreSQL")
            .on_query(
                "c.relname = 'users'",
                vec![json!({"table_name": "users", "remark": "accounts"})],
            )
            .on_query("c.relname =", vec![])
            .on_query(
                "FROM pg_class",
                vec![
                    json!({"table_name": "users", "remark": "accounts"}),
                    json!({"table_name": "orders", "remark": "purchases"}),
                ],
            )
            .on_query(
                "information_schema.columns",
                vec![json!({"pos": 1, "name": "id", "type": "integer", "len": 32,
                            "pk": "Y", "nullable": "NO", "remark": ""})],
            )
    }

    async fn seeded(dir: &Path) {
        let mut users = TableSchema::new("users", "application accounts");
        users.add_column(sqlgen_core::ColumnSchema {
            position: 1,
            name: "id".to_string(),
            data_type: "integer".to_string(),
            length: 32,
            is_primary_key: true,
            nullable: false,
            comment: String::new(),
        });
        let orders = TableSchema::new("orders", "customer purchases");
        SchemaStore::new(dir).write_all(&[orders, users]).await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_from_documents() {
        let dir = tempfile::tempdir().unwrap();
        seeded(dir.path()).await;
        let executor = Arc::new(ScriptedExecutor::new("PostgreSQL"));
        let catalog = SchemaCatalog::new(
            &config(dir.path(), true),
            SchemaExtractor::new(executor.clone(), dir.path()),
        );

        let all = catalog.list().await.unwrap().unwrap();
        assert_eq!(all.len(), 2);

        let hits = catalog.search("USER").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].table_name, "users");

        let users = catalog.get_table_schema("USERS").await.unwrap();
        assert_eq!(users.primary_key_names(), vec!["id"]);

        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_query_matches_all() {
        let dir = tempfile::tempdir().unwrap();
        seeded(dir.path()).await;
        let catalog = SchemaCatalog::new(
            &config(dir.path(), false),
            SchemaExtractor::new(Arc::new(ScriptedExecutor::new("PostgreSQL")), dir.path()),
        );
        assert_eq!(catalog.search("").await.unwrap().len(), 2);
        assert!(catalog.search("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SchemaCatalog::new(
            &config(dir.path(), false),
            SchemaExtractor::new(Arc::new(live_catalog()), dir.path()),
        );

        assert!(catalog.list().await.unwrap().is_none());
        assert!(catalog.search("users").await.unwrap().is_empty());
        let err = catalog.get_table_schema("users").await.unwrap_err();
        assert!(matches!(err, McpError::TableNotFound(ref t) if t == "users"));
    }

    #[tokio::test]
    async fn test_live_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SchemaCatalog::new(
            &config(dir.path(), true),
            SchemaExtractor::new(Arc::new(live_catalog()), dir.path()),
        );

        let page = catalog.list().await.unwrap().unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].table_name, "orders");

        let hits = catalog.search("purchase").await.unwrap();
        assert_eq!(hits.len(), 1);

        let users = catalog.get_table_schema("users").await.unwrap();
        assert_eq!(users.columns.len(), 1);

        let err = catalog.get_table_schema("NONEXISTENT").await.unwrap_err();
        assert!(matches!(err, McpError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_index() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SchemaCatalog::new(
            &config(dir.path(), false),
            SchemaExtractor::new(Arc::new(ScriptedExecutor::new("PostgreSQL")), dir.path()),
        );
        assert!(catalog.index().await.is_none());

        seeded(dir.path()).await;
        assert!(catalog.index().await.is_none());

        catalog.reload().await;
        assert_eq!(catalog.index().await.unwrap().len(), 2);
    }
}
