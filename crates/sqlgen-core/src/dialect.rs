//! SQL dialects and their catalog queries.
//!
//! Every catalog query aliases its columns to a fixed vocabulary so the
//! extractor can normalize rows without knowing which dialect produced them:
//!
//! - tables: `TABLE_NAME`, `REMARK`
//! - columns: `POS`, `NAME`, `TYPE`, `LEN`, `PK`, `NULLABLE`, `REMARK`
//!
//! Some databases fold unquoted aliases to lower case, so consumers must
//! look these keys up case-insensitively.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static SELECT_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^select(\s+(distinct|all))?\b").expect("select head pattern is valid")
});

static ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border\s+by\b").expect("order by pattern is valid"));

/// A flavor of SQL catalog metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dialect {
    Postgres,
    Oracle,
    MsSql,
    MySql,
    Unknown,
}

/// How to obtain an execution plan for a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainPlan {
    /// A single statement whose rows are the plan.
    Direct(String),
    /// Generate the plan into a plan table, then read it back.
    Staged { prepare: String, fetch: String },
}

impl Dialect {
    /// Identify the dialect from a driver or product name.
    ///
    /// Specific dialects are checked in a fixed order; anything unrecognised
    /// is `Unknown`.
    pub fn detect(driver_name: &str) -> Self {
        let name = driver_name.to_lowercase();
        if name.contains("oracle") {
            Dialect::Oracle
        } else if name.contains("sql server") || name.contains("microsoft") {
            Dialect::MsSql
        } else if name.contains("postgres") {
            Dialect::Postgres
        } else if name.contains("mysql") || name.contains("mariadb") {
            Dialect::MySql
        } else {
            Dialect::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "POSTGRES",
            Dialect::Oracle => "ORACLE",
            Dialect::MsSql => "MSSQL",
            Dialect::MySql => "MYSQL",
            Dialect::Unknown => "UNKNOWN",
        }
    }

    /// Whether catalog introspection is available for this dialect.
    pub fn supports_introspection(&self) -> bool {
        !matches!(self, Dialect::Unknown)
    }

    /// Fold an identifier the way the catalog stores unquoted names.
    pub fn normalize_identifier(&self, name: &str) -> String {
        match self {
            Dialect::Oracle => name.to_uppercase(),
            Dialect::Postgres => name.to_lowercase(),
            _ => name.to_string(),
        }
    }

    /// Query listing every user table with its comment.
    pub fn list_tables_sql(&self) -> Option<String> {
        self.tables_sql(None)
    }

    /// Query returning the catalog entry of one table (zero or one row).
    pub fn lookup_table_sql(&self, table_name: &str) -> Option<String> {
        self.tables_sql(Some(table_name))
    }

    fn tables_sql(&self, only: Option<&str>) -> Option<String> {
        let filter = |column: &str, keyword: &str| {
            only.map(|t| format!(" {} {} = '{}'", keyword, column, quote_literal(t)))
                .unwrap_or_default()
        };
        let sql = match self {
            Dialect::Postgres => format!(
                "SELECT c.relname::text AS TABLE_NAME, \
                 COALESCE(obj_description(c.oid, 'pg_class'), '') AS REMARK \
                 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE c.relkind = 'r' AND n.nspname = 'public'{} \
                 ORDER BY c.relname",
                filter("c.relname", "AND")
            ),
            Dialect::Oracle => format!(
                "SELECT TABLE_NAME, COMMENTS AS REMARK FROM USER_TAB_COMMENTS \
                 WHERE TABLE_TYPE = 'TABLE'{} ORDER BY TABLE_NAME",
                filter("TABLE_NAME", "AND")
            ),
            Dialect::MsSql => format!(
                "SELECT t.name AS TABLE_NAME, CAST(p.value AS NVARCHAR(4000)) AS REMARK \
                 FROM sys.tables t LEFT JOIN sys.extended_properties p \
                 ON t.object_id = p.major_id AND p.minor_id = 0 AND p.name = 'MS_Description'{} \
                 ORDER BY t.name",
                filter("t.name", "WHERE")
            ),
            Dialect::MySql => format!(
                "SELECT TABLE_NAME AS TABLE_NAME, TABLE_COMMENT AS REMARK \
                 FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'{} \
                 ORDER BY TABLE_NAME",
                filter("TABLE_NAME", "AND")
            ),
            Dialect::Unknown => return None,
        };
        Some(sql)
    }

    /// Query listing the columns of one table in ordinal order.
    pub fn list_columns_sql(&self, table_name: &str) -> Option<String> {
        let t = quote_literal(table_name);
        let sql = match self {
            Dialect::Postgres => format!(
                "SELECT c.ordinal_position::int AS POS, c.column_name::text AS NAME, \
                 c.data_type::text AS TYPE, \
                 COALESCE(c.character_maximum_length, c.numeric_precision, 0)::int AS LEN, \
                 CASE WHEN EXISTS (\
                   SELECT 1 FROM information_schema.table_constraints tc \
                   JOIN information_schema.key_column_usage kcu \
                     ON tc.constraint_name = kcu.constraint_name \
                    AND tc.table_schema = kcu.table_schema \
                   WHERE tc.constraint_type = 'PRIMARY KEY' \
                     AND tc.table_schema = c.table_schema \
                     AND tc.table_name = c.table_name \
                     AND kcu.column_name = c.column_name) \
                 THEN 'Y' ELSE 'N' END AS PK, \
                 c.is_nullable::text AS NULLABLE, \
                 COALESCE(col_description(format('%I.%I', c.table_schema, c.table_name)::regclass, \
                 c.ordinal_position::int), '') AS REMARK \
                 FROM information_schema.columns c \
                 WHERE c.table_schema = 'public' AND c.table_name = '{t}' \
                 ORDER BY c.ordinal_position"
            ),
            Dialect::Oracle => format!(
                "SELECT ATC.COLUMN_ID AS POS, ATC.COLUMN_NAME AS NAME, ATC.DATA_TYPE AS TYPE, \
                 ATC.DATA_LENGTH AS LEN, \
                 (SELECT 'Y' FROM USER_CONS_COLUMNS UCC, USER_CONSTRAINTS UC \
                   WHERE UCC.CONSTRAINT_NAME = UC.CONSTRAINT_NAME AND UC.CONSTRAINT_TYPE = 'P' \
                   AND UCC.TABLE_NAME = ATC.TABLE_NAME AND UCC.COLUMN_NAME = ATC.COLUMN_NAME \
                   AND ROWNUM = 1) AS PK, \
                 ATC.NULLABLE AS NULLABLE, ACC.COMMENTS AS REMARK \
                 FROM USER_TAB_COLUMNS ATC, USER_COL_COMMENTS ACC \
                 WHERE ATC.TABLE_NAME = ACC.TABLE_NAME AND ATC.COLUMN_NAME = ACC.COLUMN_NAME \
                 AND ATC.TABLE_NAME = '{t}' ORDER BY ATC.COLUMN_ID"
            ),
            Dialect::MsSql => format!(
                "SELECT c.column_id AS POS, c.name AS NAME, TYPE_NAME(c.user_type_id) AS TYPE, \
                 c.max_length AS LEN, \
                 ISNULL((SELECT TOP 1 'Y' FROM sys.index_columns ic \
                   JOIN sys.indexes i ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
                   WHERE i.is_primary_key = 1 AND ic.object_id = c.object_id \
                   AND ic.column_id = c.column_id), 'N') AS PK, \
                 (CASE WHEN c.is_nullable = 1 THEN 'Y' ELSE 'N' END) AS NULLABLE, \
                 CAST(p.value AS NVARCHAR(4000)) AS REMARK \
                 FROM sys.columns c LEFT JOIN sys.extended_properties p \
                 ON c.object_id = p.major_id AND c.column_id = p.minor_id \
                 AND p.name = 'MS_Description' \
                 WHERE c.object_id = OBJECT_ID('{t}') ORDER BY c.column_id"
            ),
            Dialect::MySql => format!(
                "SELECT ORDINAL_POSITION AS POS, COLUMN_NAME AS NAME, DATA_TYPE AS TYPE, \
                 COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, 0) AS LEN, \
                 CASE WHEN COLUMN_KEY = 'PRI' THEN 'Y' ELSE 'N' END AS PK, \
                 IS_NULLABLE AS NULLABLE, COLUMN_COMMENT AS REMARK \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = '{t}' \
                 ORDER BY ORDINAL_POSITION"
            ),
            Dialect::Unknown => return None,
        };
        Some(sql)
    }

    /// Extend `sql` so it returns at most `limit` rows.
    ///
    /// Trailing comments and statement terminators are removed first. The
    /// caller decides whether a limit is needed at all.
    pub fn with_row_limit(&self, sql: &str, limit: u64) -> String {
        let body = statement_body(sql);
        match self {
            Dialect::Oracle => format!("{} FETCH FIRST {} ROWS ONLY", body, limit),
            Dialect::MsSql => mssql_row_limit(body, limit),
            Dialect::Postgres | Dialect::MySql | Dialect::Unknown => {
                format!("{} LIMIT {}", body, limit)
            }
        }
    }

    /// Statements that produce an execution plan for `sql`.
    pub fn explain_plan(&self, sql: &str) -> ExplainPlan {
        let body = statement_body(sql);
        match self {
            Dialect::Postgres => ExplainPlan::Direct(format!("EXPLAIN (FORMAT JSON) {}", body)),
            Dialect::MySql => ExplainPlan::Direct(format!("EXPLAIN FORMAT=JSON {}", body)),
            Dialect::Oracle => ExplainPlan::Staged {
                prepare: format!("EXPLAIN PLAN FOR {}", body),
                fetch: "SELECT PLAN_TABLE_OUTPUT FROM TABLE(DBMS_XPLAN.DISPLAY())".to_string(),
            },
            Dialect::MsSql | Dialect::Unknown => ExplainPlan::Direct(format!("EXPLAIN {}", body)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape a value for use inside a single-quoted SQL literal.
pub fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// SQL Server has no trailing limit clause and rejects `ORDER BY` inside a
/// derived table, so `TOP` goes after the leading `SELECT [DISTINCT|ALL]`.
/// Anything else (a CTE, a parenthesized query) gets `OFFSET ... FETCH`.
fn mssql_row_limit(body: &str, limit: u64) -> String {
    let masked = mask_sql(body);
    if let Some(head) = SELECT_HEAD.find(&masked) {
        let at = head.end();
        return format!("{} TOP {}{}", &body[..at], limit, &body[at..]);
    }
    if ORDER_BY.is_match(&masked) {
        format!("{} OFFSET 0 ROWS FETCH NEXT {} ROWS ONLY", body, limit)
    } else {
        format!(
            "{} ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT {} ROWS ONLY",
            body, limit
        )
    }
}

/// Copy of `sql` with comments and the contents of quoted literals and
/// identifiers replaced by spaces. Byte offsets match the input, so
/// positions found in the mask can be used to slice `sql`.
pub fn mask_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                while let Some(d) = chars.next() {
                    if d == c {
                        // doubled quote is an escaped quote
                        if chars.peek() == Some(&c) {
                            chars.next();
                            blank(&mut out, d);
                            blank(&mut out, c);
                            continue;
                        }
                        out.push(d);
                        break;
                    }
                    blank(&mut out, d);
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                blank(&mut out, c);
                while let Some(&d) = chars.peek() {
                    if d == '\n' {
                        break;
                    }
                    chars.next();
                    blank(&mut out, d);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                blank(&mut out, c);
                let mut prev = ' ';
                if let Some(star) = chars.next() {
                    blank(&mut out, star);
                }
                for d in chars.by_ref() {
                    blank(&mut out, d);
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}

/// The executable part of `sql`: surrounding whitespace, trailing comments
/// and trailing `;` terminators removed.
pub fn statement_body(sql: &str) -> &str {
    let masked = mask_sql(sql);
    let start = masked.len() - masked.trim_start().len();
    let end = masked
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .len();
    if start >= end { "" } else { &sql[start..end] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_dialects() {
        assert_eq!(Dialect::detect("Oracle JDBC driver"), Dialect::Oracle);
        assert_eq!(
            Dialect::detect("Microsoft JDBC Driver 12.4 for SQL Server"),
            Dialect::MsSql
        );
        assert_eq!(Dialect::detect("PostgreSQL"), Dialect::Postgres);
        assert_eq!(Dialect::detect("MariaDB Connector/J"), Dialect::MySql);
        assert_eq!(Dialect::detect("SQLite"), Dialect::Unknown);
    }

    #[test]
    fn test_detect_checks_oracle_first() {
        assert_eq!(Dialect::detect("Oracle driver for Microsoft tools"), Dialect::Oracle);
        assert_eq!(Dialect::detect("jTDS SQL Server driver"), Dialect::MsSql);
    }

    #[test]
    fn test_unknown_has_no_catalog_queries() {
        assert!(Dialect::Unknown.list_tables_sql().is_none());
        assert!(Dialect::Unknown.list_columns_sql("users").is_none());
        assert!(!Dialect::Unknown.supports_introspection());
    }

    #[test]
    fn test_lookup_table_filters_by_name() {
        let sql = Dialect::Postgres.lookup_table_sql("users").unwrap();
        assert!(sql.contains("c.relname = 'users'"));
        let sql = Dialect::MsSql.lookup_table_sql("users").unwrap();
        assert!(sql.contains("WHERE t.name = 'users'"));
    }

    #[test]
    fn test_column_query_escapes_quotes() {
        let sql = Dialect::Oracle.list_columns_sql("O'BRIEN").unwrap();
        assert!(sql.contains("'O''BRIEN'"));
    }

    #[test]
    fn test_with_row_limit() {
        assert_eq!(
            Dialect::Postgres.with_row_limit("SELECT 1;", 100),
            "SELECT 1 LIMIT 100"
        );
        assert_eq!(
            Dialect::Oracle.with_row_limit("SELECT * FROM T ", 10),
            "SELECT * FROM T FETCH FIRST 10 ROWS ONLY"
        );
        assert_eq!(
            Dialect::MsSql.with_row_limit("SELECT * FROM t", 5),
            "SELECT TOP 5 * FROM t"
        );
    }

    #[test]
    fn test_row_limit_drops_trailing_comments() {
        assert_eq!(
            Dialect::Postgres.with_row_limit("SELECT * FROM big_table -- every row", 1000),
            "SELECT * FROM big_table LIMIT 1000"
        );
        assert_eq!(
            Dialect::MySql.with_row_limit("SELECT 1; /* done */\n", 10),
            "SELECT 1 LIMIT 10"
        );
        assert_eq!(
            Dialect::Postgres.with_row_limit("SELECT '--' AS dashes", 10),
            "SELECT '--' AS dashes LIMIT 10"
        );
    }

    #[test]
    fn test_mssql_row_limit_keeps_order_by_valid() {
        assert_eq!(
            Dialect::MsSql.with_row_limit("SELECT * FROM orders ORDER BY created_at DESC", 1000),
            "SELECT TOP 1000 * FROM orders ORDER BY created_at DESC"
        );
        assert_eq!(
            Dialect::MsSql.with_row_limit("select distinct region from orders;", 10),
            "select distinct TOP 10 region from orders"
        );
        assert_eq!(
            Dialect::MsSql.with_row_limit("SELECT distinctive FROM t", 10),
            "SELECT TOP 10 distinctive FROM t"
        );
        assert_eq!(
            Dialect::MsSql
                .with_row_limit("WITH r AS (SELECT 1 AS n) SELECT n FROM r ORDER BY n", 3),
            "WITH r AS (SELECT 1 AS n) SELECT n FROM r ORDER BY n \
             OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY"
        );
        assert_eq!(
            Dialect::MsSql.with_row_limit("WITH r AS (SELECT 1 AS n) SELECT n FROM r", 3),
            "WITH r AS (SELECT 1 AS n) SELECT n FROM r \
             ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 3 ROWS ONLY"
        );
    }

    #[test]
    fn test_mask_sql() {
        assert_eq!(mask_sql("a = 'it''s' -- x\nb"), "a = '     '     \nb");
        assert_eq!(mask_sql("\"limit\" /* top 5 */ y"), "\"     \"             y");
        assert_eq!(mask_sql("x = 'é'").len(), "x = 'é'".len());
        assert_eq!(statement_body("  -- only a comment\n  ;"), "");
    }

    #[test]
    fn test_explain_plan() {
        assert_eq!(
            Dialect::Postgres.explain_plan("SELECT 1;"),
            ExplainPlan::Direct("EXPLAIN (FORMAT JSON) SELECT 1".to_string())
        );
        let ExplainPlan::Staged { prepare, .. } = Dialect::Oracle.explain_plan("SELECT 1 FROM DUAL")
        else {
            panic!("oracle plans are staged");
        };
        assert_eq!(prepare, "EXPLAIN PLAN FOR SELECT 1 FROM DUAL");
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(Dialect::Oracle.normalize_identifier("ord_item"), "ORD_ITEM");
        assert_eq!(Dialect::Postgres.normalize_identifier("ORD_ITEM"), "ord_item");
        assert_eq!(Dialect::MySql.normalize_identifier("Ord_Item"), "Ord_Item");
    }
}
