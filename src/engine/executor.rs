//! Query Executor
//!
//! Runs a caller-supplied SQL string and normalizes whatever it produces into a
//! [`QueryResult`]. Read statements are materialized in full; mutating statements
//! report affected rows and the last insert id. No retries.

use rusqlite::Connection;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::classify::{classify, has_trailing_statement, StatementKind};
use crate::engine::store::sqlite_value_to_json;
use crate::engine::{QueryResult, Store, MUTATION_COLUMNS};
use crate::error::{DeskError, Result};

/// Raw SQL execution over the shared store
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    store: Arc<Store>,
}

impl QueryExecutor {
    /// Create an executor over an injected store
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Classify and execute one SQL statement
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(DeskError::validation("SQL query cannot be empty"));
        }
        if has_trailing_statement(sql) {
            return Err(DeskError::validation("Multiple statements are not supported"));
        }

        let kind = classify(sql);
        debug!(?kind, sql = %preview_sql(sql), "executing statement");

        self.store.with_conn(|conn| {
            let start = Instant::now();
            let (columns, rows, row_count) = match kind {
                StatementKind::Read => run_read(conn, sql)?,
                StatementKind::Mutating => run_mutating(conn, sql)?,
            };
            let execution_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            debug!(row_count, execution_time_ms, "statement finished");
            Ok(QueryResult { columns, rows, row_count, execution_time_ms })
        })
    }
}

type Materialized = (Vec<String>, Vec<Vec<Value>>, u64);

/// Execute a read statement and collect every row
fn run_read(conn: &Connection, sql: &str) -> Result<Materialized> {
    let mut stmt = conn.prepare(sql).map_err(|e| DeskError::execution(e.to_string()))?;
    let names = unique_column_names(stmt.column_names());
    let width = names.len();

    let mut rows = Vec::new();
    let mut raw_rows = stmt.raw_query();
    while let Some(row) = raw_rows.next().map_err(|e| DeskError::execution(e.to_string()))? {
        let values = (0..width)
            .map(|idx| sqlite_value_to_json(row, idx))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DeskError::execution(e.to_string()))?;
        rows.push(values);
    }

    // Column list follows the first row; an empty result has no columns
    let columns = if rows.is_empty() { Vec::new() } else { names };
    let row_count = rows.len() as u64;
    Ok((columns, rows, row_count))
}

/// Execute a mutating statement and wrap its effect in the two-column envelope
fn run_mutating(conn: &Connection, sql: &str) -> Result<Materialized> {
    let mut stmt = conn.prepare(sql).map_err(|e| DeskError::execution(e.to_string()))?;
    let before = total_changes(conn)?;

    // Drain instead of execute() so statements that happen to return rows still run
    let mut raw_rows = stmt.raw_query();
    while raw_rows.next().map_err(|e| DeskError::execution(e.to_string()))?.is_some() {}

    // changes() keeps the count of the last DML statement, so only trust it when this one wrote rows
    let affected_rows = if total_changes(conn)? == before { 0 } else { conn.changes() as u64 };
    let last_insert_id = conn.last_insert_rowid();

    let columns = MUTATION_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    let rows = vec![vec![Value::from(affected_rows), Value::from(last_insert_id)]];
    Ok((columns, rows, affected_rows))
}

/// Rows changed by every statement since the connection opened
fn total_changes(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
        .map_err(|e| DeskError::execution(e.to_string()))
}

/// Suffix repeated column names (`id`, `id_2`, ...) so names stay unique
fn unique_column_names(names: Vec<&str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while unique.contains(&candidate) {
            candidate = format!("{name}_{n}");
            n += 1;
        }
        unique.push(candidate);
    }
    unique
}

/// First 160 bytes of a statement, for logs
pub(crate) fn preview_sql(sql: &str) -> String {
    const LIMIT: usize = 160;
    let sql = sql.trim();
    if sql.len() <= LIMIT {
        return sql.to_string();
    }
    let mut end = LIMIT;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn seeded_executor() -> QueryExecutor {
        let store = Store::open_in_memory().unwrap();
        store.seed_sample_data().unwrap();
        QueryExecutor::new(Arc::new(store))
    }

    #[test]
    fn test_select_active_users() {
        let executor = seeded_executor();
        let result = executor.execute("SELECT username FROM users WHERE status = 'active'").unwrap();

        assert_eq!(result.columns, vec!["username".to_string()]);
        assert_eq!(result.row_count, 4);
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[0], vec![json!("john_doe")]);
    }

    #[test]
    fn test_rows_match_column_width() {
        let executor = seeded_executor();
        let result = executor.execute("SELECT * FROM posts").unwrap();

        assert_eq!(result.columns.len(), 6);
        assert!(result.rows.iter().all(|row| row.len() == result.columns.len()));
    }

    #[test]
    fn test_empty_select_has_no_columns() {
        let executor = seeded_executor();
        let result = executor.execute("SELECT * FROM users WHERE id = -1").unwrap();

        assert!(result.columns.is_empty());
        assert!(result.rows.is_empty());
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_insert_envelope() {
        let executor = seeded_executor();
        let result = executor
            .execute("INSERT INTO categories (name) VALUES ('Databases')")
            .unwrap();

        assert_eq!(result.columns, vec!["affected_rows".to_string(), "last_insert_id".to_string()]);
        assert_eq!(result.rows, vec![vec![json!(1), json!(4)]]);
        assert_eq!(result.row_count, 1);
    }

    #[test]
    fn test_update_envelope_counts_rows() {
        let executor = seeded_executor();
        let result = executor.execute("UPDATE users SET status = 'archived' WHERE status = 'active'").unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], json!(4));
        assert_eq!(result.row_count, 4);
    }

    #[test]
    fn test_ddl_returns_single_row_envelope() {
        let executor = seeded_executor();
        let update = executor.execute("UPDATE users SET status = 'x' WHERE status = 'active'").unwrap();
        assert_eq!(update.rows[0][0], json!(4));

        for ddl in ["CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT)", "DROP TABLE tags"] {
            let result = executor.execute(ddl).unwrap();
            assert_eq!(result.columns.len(), 2, "{ddl}");
            assert_eq!(result.rows.len(), 1, "{ddl}");
            assert_eq!(result.rows[0].len(), 2, "{ddl}");
            assert_eq!(result.rows[0][0], json!(0), "{ddl}");
            assert_eq!(result.row_count, 0, "{ddl}");
        }
    }

    #[test]
    fn test_no_match_update_reports_zero_after_prior_write() {
        let executor = seeded_executor();
        executor.execute("DELETE FROM posts WHERE user_id = 1").unwrap();
        let result = executor.execute("UPDATE users SET status = 'x' WHERE id = 999").unwrap();

        assert_eq!(result.rows[0][0], json!(0));
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_row_returning_pragma_runs_as_mutating() {
        let executor = seeded_executor();
        let result = executor.execute("PRAGMA table_info(users)").unwrap();

        assert_eq!(result.columns, vec!["affected_rows".to_string(), "last_insert_id".to_string()]);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_lowercase_and_commented_select() {
        let executor = seeded_executor();
        let result = executor.execute("-- who is here\nselect count(*) as n from users").unwrap();

        assert_eq!(result.columns, vec!["n".to_string()]);
        assert_eq!(result.rows, vec![vec![json!(5)]]);
    }

    #[test]
    fn test_duplicate_column_names_are_suffixed() {
        let executor = seeded_executor();
        let result = executor
            .execute("SELECT u.id, p.id FROM users u JOIN posts p ON p.user_id = u.id LIMIT 1")
            .unwrap();

        assert_eq!(result.columns, vec!["id".to_string(), "id_2".to_string()]);
    }

    #[test]
    fn test_empty_sql_rejected() {
        let executor = seeded_executor();
        assert!(matches!(executor.execute("").unwrap_err(), DeskError::Validation(_)));
        assert!(matches!(executor.execute(" \n\t ").unwrap_err(), DeskError::Validation(_)));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let executor = seeded_executor();
        let err = executor.execute("SELECT 1; DROP TABLE users").unwrap_err();
        assert!(matches!(err, DeskError::Validation(_)));

        // users survived
        assert_eq!(executor.execute("SELECT COUNT(*) FROM users").unwrap().rows[0][0], json!(5));
    }

    #[test]
    fn test_malformed_sql_is_execution_error() {
        let executor = seeded_executor();
        let err = executor.execute("SELEC * FROM users").unwrap_err();
        assert!(matches!(err, DeskError::Execution(_)));

        let err = executor.execute("SELECT * FROM ghosts").unwrap_err();
        assert!(err.message().contains("no such table"));
    }

    #[test]
    fn test_constraint_violation_is_execution_error() {
        let executor = seeded_executor();
        let err = executor
            .execute("INSERT INTO users (username, email) VALUES ('john_doe', 'dup@example.com')")
            .unwrap_err();
        assert!(matches!(err, DeskError::Execution(_)));
        assert!(err.message().contains("UNIQUE"));
    }

    #[test]
    fn test_preview_sql_truncates() {
        let long = format!("SELECT {}", "x, ".repeat(100));
        let preview = preview_sql(&long);
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= 163);
        assert_eq!(preview_sql("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_unique_column_names() {
        assert_eq!(
            unique_column_names(vec!["a", "b", "a", "a", "a_2"]),
            vec!["a", "b", "a_2", "a_3", "a_2_2"]
        );
    }
}
