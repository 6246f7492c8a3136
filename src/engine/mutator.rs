//! Row Mutator
//!
//! Schema-driven insert/update/delete against a named table. Identifiers pass
//! through [`quote`](crate::engine::identifier::quote); values are always bound.
//! Update and delete address rows by a column literally named `id`.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::engine::catalog::{describe_columns, ensure_table};
use crate::engine::identifier::{quote, quote_list};
use crate::engine::store::{json_to_sql, row_id_to_sql};
use crate::engine::{RowId, RowRecord, Store};
use crate::error::{DeskError, Result};

/// Effect of a single mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// Rows changed by the statement
    pub affected_rows: u64,

    /// Rowid of the most recent insert on the connection
    pub last_insert_id: i64,
}

/// Parameterized CRUD over the shared store
#[derive(Debug, Clone)]
pub struct RowMutator {
    store: Arc<Store>,
}

impl RowMutator {
    /// Create a mutator over an injected store
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// `INSERT INTO <table>(<cols>) VALUES (<placeholders>)`
    pub fn insert_row(&self, table: &str, values: &RowRecord) -> Result<MutationOutcome> {
        if values.is_empty() {
            return Err(DeskError::validation("Nothing to insert: no column values supplied"));
        }

        self.store.with_conn(|conn| {
            check_columns(conn, table, values)?;

            let placeholders = vec!["?"; values.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote(table)?,
                quote_list(values.columns())?,
            );

            run(conn, &sql, bind_values(values)?)
        })
    }

    /// `UPDATE <table> SET <col> = ? [, ...] WHERE id = ?`
    pub fn update_row(&self, table: &str, id: &RowId, values: &RowRecord) -> Result<MutationOutcome> {
        if values.is_empty() {
            return Err(DeskError::validation("Nothing to update: no column values supplied"));
        }

        self.store.with_conn(|conn| {
            check_columns(conn, table, values)?;

            let assignments = values
                .columns()
                .map(|column| Ok(format!("{} = ?", quote(column)?)))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            let sql = format!("UPDATE {} SET {assignments} WHERE id = ?", quote(table)?);

            let mut params = bind_values(values)?;
            params.push(row_id_to_sql(id));
            run(conn, &sql, params)
        })
    }

    /// `DELETE FROM <table> WHERE id = ?`
    pub fn delete_row(&self, table: &str, id: &RowId) -> Result<MutationOutcome> {
        self.store.with_conn(|conn| {
            ensure_table(conn, table)?;
            let sql = format!("DELETE FROM {} WHERE id = ?", quote(table)?);
            run(conn, &sql, vec![row_id_to_sql(id)])
        })
    }
}

/// Every supplied key must be a column of the table
fn check_columns(conn: &Connection, table: &str, values: &RowRecord) -> Result<()> {
    let columns = describe_columns(conn, table)?;
    for key in values.columns() {
        if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(key)) {
            return Err(DeskError::validation(format!("Table '{table}' has no column '{key}'")));
        }
    }
    Ok(())
}

fn bind_values(values: &RowRecord) -> Result<Vec<SqlValue>> {
    values.iter().map(|(column, value)| json_to_sql(column, value)).collect()
}

fn run(conn: &Connection, sql: &str, params: Vec<SqlValue>) -> Result<MutationOutcome> {
    debug!(%sql, params = params.len(), "running mutation");
    let affected = conn
        .execute(sql, params_from_iter(params))
        .map_err(|e| DeskError::execution(e.to_string()))?;

    Ok(MutationOutcome { affected_rows: affected as u64, last_insert_id: conn.last_insert_rowid() })
}
