//! The query executor capability.
//!
//! Everything above the database driver talks to it through
//! [`QueryExecutor`]: run a query and get JSON rows back, run a statement
//! and get an affected-row count, and report which driver is behind it.

use crate::dialect::Dialect;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A result row keyed by column label.
pub type Row = Map<String, Value>;

/// Errors raised by a query executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A connection could not be acquired.
    #[error("connection error: {0}")]
    Connection(String),

    /// The database rejected or failed the statement.
    #[error("{0}")]
    Statement(String),
}

/// Opaque access to a relational database.
///
/// Implementations borrow a pooled connection per call and release it on
/// every exit path.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a row-returning statement.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecutorError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64, ExecutorError>;

    /// Driver or product identifier, used for dialect detection.
    fn driver_name(&self) -> String;

    fn dialect(&self) -> Dialect {
        Dialect::detect(&self.driver_name())
    }
}

/// Case-insensitive field lookup on a catalog row.
pub fn row_field<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    row.get(key).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

#[cfg(feature = "testing")]
pub mod testing {
    //! A scripted in-memory executor for tests.

    use super::*;
    use std::sync::Mutex;

    enum Response {
        Rows(Vec<Row>),
        Fail(String),
    }

    /// Answers queries from a script of `(sql fragment, response)` pairs.
    ///
    /// The first rule whose fragment occurs in the SQL wins; unmatched
    /// queries return no rows. Every statement is recorded.
    pub struct ScriptedExecutor {
        driver: String,
        rules: Mutex<Vec<(String, Response)>>,
        affected_rows: u64,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new(driver: impl Into<String>) -> Self {
            Self {
                driver: driver.into(),
                rules: Mutex::new(Vec::new()),
                affected_rows: 0,
                log: Mutex::new(Vec::new()),
            }
        }

        /// Return `rows` for any SQL containing `fragment`.
        pub fn on_query(self, fragment: impl Into<String>, rows: Vec<Value>) -> Self {
            let rows = rows
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            self.rules
                .lock()
                .unwrap()
                .push((fragment.into(), Response::Rows(rows)));
            self
        }

        /// Fail any SQL containing `fragment` with `message`.
        pub fn fail_on(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((fragment.into(), Response::Fail(message.into())));
            self
        }

        pub fn with_affected_rows(mut self, n: u64) -> Self {
            self.affected_rows = n;
            self
        }

        /// Every statement seen so far, in order.
        pub fn executed(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn respond(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
            self.log.lock().unwrap().push(sql.to_string());
            let rules = self.rules.lock().unwrap();
            match rules.iter().find(|(fragment, _)| sql.contains(fragment.as_str())) {
                Some((_, Response::Rows(rows))) => Ok(rows.clone()),
                Some((_, Response::Fail(message))) => {
                    Err(ExecutorError::Statement(message.clone()))
                }
                None => Ok(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for ScriptedExecutor {
        async fn query(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
            self.respond(sql)
        }

        async fn execute(&self, sql: &str) -> Result<u64, ExecutorError> {
            self.respond(sql).map(|_| self.affected_rows)
        }

        fn driver_name(&self) -> String {
            self.driver.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_field_is_case_insensitive() {
        let row: Row = json!({"table_name": "users", "REMARK": "x"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(row_field(&row, "TABLE_NAME"), Some(&json!("users")));
        assert_eq!(row_field(&row, "remark"), Some(&json!("x")));
        assert_eq!(row_field(&row, "missing"), None);
    }
}
