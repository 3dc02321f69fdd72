//! Postgres implementation of [`QueryExecutor`].
//!
//! Rows are converted to JSON objects column by column; values whose type
//! has no JSON mapping become `null`.

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlgen_core::config::UpstreamConfig;
use sqlgen_core::executor::{ExecutorError, QueryExecutor, Row};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row as _};
use std::time::Duration;

/// Driver identifier reported for dialect detection.
pub const DRIVER_NAME: &str = "PostgreSQL";

/// Scheme for URLs assembled from individual upstream settings.
pub const URL_SCHEME: &str = "postgres";

pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Build a pool from the upstream configuration and verify connectivity.
    pub async fn connect(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.pool.idle_timeout_seconds))
            .connect(&config.connection_url(URL_SCHEME))
            .await?;

        tracing::info!(
            url = %config.redacted_connection_url(URL_SCHEME),
            max_connections = config.pool.max_connections,
            "Connected to upstream database"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, sql: &str) -> Result<u64, ExecutorError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    fn driver_name(&self) -> String {
        DRIVER_NAME.to_string()
    }
}

/// Split sqlx failures into connectivity and statement errors.
fn map_sqlx_error(err: sqlx::Error) -> ExecutorError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => ExecutorError::Connection(err.to_string()),
        sqlx::Error::Database(db) => ExecutorError::Statement(db.message().to_string()),
        other => ExecutorError::Statement(other.to_string()),
    }
}

/// Convert a Postgres row to a JSON object keyed by column name.
fn row_to_json(row: &PgRow) -> Row {
    let mut obj = Row::new();
    for col in row.columns() {
        obj.insert(col.name().to_string(), column_to_json(row, col.ordinal()));
    }
    obj
}

/// Decode one column by probing the supported Rust types in turn.
fn column_to_json(row: &PgRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(idx) {
        json!(v.map(|d| d.to_string()))
    } else if let Ok(v) = row.try_get::<Option<Value>, _>(idx) {
        v.unwrap_or(Value::Null)
    } else if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        json!(v.map(|t| t.to_rfc3339()))
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        json!(v.map(|t| t.to_string()))
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
        json!(v.map(|t| t.to_string()))
    } else if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
        json!(v.map(|t| t.to_string()))
    } else if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        json!(v.map(|u| u.to_string()))
    } else if let Ok(v) = row.try_get::<Option<Vec<String>>, _>(idx) {
        json!(v)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgen_core::Dialect;

    #[test]
    fn test_pool_errors_are_connection_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            ExecutorError::Connection(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            ExecutorError::Statement(_)
        ));
    }

    #[test]
    fn test_driver_name_detects_postgres() {
        assert_eq!(Dialect::detect(DRIVER_NAME), Dialect::Postgres);
    }

    #[tokio::test]
    async fn test_lazy_pool_reports_postgres_dialect() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://postgres@localhost:5432/postgres")
            .unwrap();
        let executor = PostgresExecutor::from_pool(pool);
        assert_eq!(executor.dialect(), Dialect::Postgres);
    }
}
