//! SQL execution with row-limit and error-wrapping policy.

use crate::error::McpError;
use regex::Regex;
use serde_json::{Value, json};
use sqlgen_core::config::QueryConfig;
use sqlgen_core::dialect::mask_sql;
use sqlgen_core::{Dialect, ExplainPlan, QueryExecutor, Row};
use std::sync::{Arc, LazyLock};

static ROW_LIMIT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(limit|rownum)\b|\bfetch\s+(first|next)\b|\btop\s*\(?\s*\d+")
        .expect("row limit pattern is valid")
});

/// Whether `sql` already restricts its row count.
///
/// Comments and quoted text are ignored, so `'no limit'` does not count.
pub fn has_row_limit(sql: &str) -> bool {
    ROW_LIMIT_CLAUSE.is_match(&mask_sql(sql))
}

/// Runs agent-supplied SQL against the upstream database.
///
/// Reads without a row-limiting clause get the configured default limit
/// appended. Statements are not inspected beyond that: a "read" that
/// modifies data is executed as given.
#[derive(Clone)]
pub struct QueryGateway {
    executor: Arc<dyn QueryExecutor>,
    default_row_limit: u64,
}

impl QueryGateway {
    pub fn new(executor: Arc<dyn QueryExecutor>, config: &QueryConfig) -> Self {
        Self {
            executor,
            default_row_limit: config.default_row_limit,
        }
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// The statement actually sent for a read of `sql`.
    pub fn prepare_read(&self, sql: &str) -> String {
        if has_row_limit(sql) {
            sql.to_string()
        } else {
            self.dialect().with_row_limit(sql, self.default_row_limit)
        }
    }

    /// Run a read query and return its rows.
    pub async fn read(&self, sql: &str) -> Result<Vec<Row>, McpError> {
        let statement = self.prepare_read(sql);
        tracing::debug!(sql = %statement, "Executing read query");
        let rows = self.executor.query(&statement).await?;
        tracing::debug!(rows = rows.len(), "Read query finished");
        Ok(rows)
    }

    /// Run a write statement and return the affected row count.
    pub async fn write(&self, sql: &str) -> Result<u64, McpError> {
        tracing::info!(sql = %sql, "Executing write query");
        let affected = self.executor.execute(sql).await?;
        tracing::info!(affected_rows = affected, "Write query finished");
        Ok(affected)
    }

    /// Execution plan for `sql`, or `{"error": ...}` when it cannot be produced.
    pub async fn explain(&self, sql: &str) -> Value {
        let dialect = self.dialect();
        let plan = match dialect.explain_plan(sql) {
            ExplainPlan::Direct(statement) => self.executor.query(&statement).await,
            ExplainPlan::Staged { prepare, fetch } => match self.executor.execute(&prepare).await {
                Ok(_) => self.executor.query(&fetch).await,
                Err(e) => Err(e),
            },
        };

        match plan {
            Ok(rows) => json!({ "dialect": dialect, "plan": rows }),
            Err(e) => {
                tracing::warn!(error = %e, dialect = %dialect, "Explain failed");
                json!({ "error": e.to_string() })
            }
        }
    }
}
