//! Schema Catalog
//!
//! Live introspection of the store's tables, views and columns. Nothing is cached:
//! every call reads the catalog again.

use rusqlite::Connection;
use std::sync::Arc;
use tracing::debug;

use crate::engine::identifier::quote;
use crate::engine::{ColumnDescriptor, Store, TableDescriptor, TableKind};
use crate::error::{DeskError, Result};

/// User-visible tables and views, internal `sqlite_%` objects excluded
const LIST_TABLES_SQL: &str = "SELECT name, type FROM sqlite_master
     WHERE type IN ('table', 'view')
     AND name NOT LIKE 'sqlite_%'
     ORDER BY name";

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS(
     SELECT 1 FROM sqlite_master
     WHERE type IN ('table', 'view')
     AND name NOT LIKE 'sqlite_%'
     AND name = ?1)";

/// Schema introspection over the shared store
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    store: Arc<Store>,
}

impl SchemaCatalog {
    /// Create a catalog over an injected store
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// List tables and views ordered by name, each with a live row count
    pub fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        self.store.with_conn(list_tables)
    }

    /// Describe the columns of a table or view
    pub fn describe_table(&self, name: &str) -> Result<Vec<ColumnDescriptor>> {
        self.store.with_conn(|conn| describe_columns(conn, name))
    }
}

pub(crate) fn list_tables(conn: &Connection) -> Result<Vec<TableDescriptor>> {
    let mut stmt = conn
        .prepare(LIST_TABLES_SQL)
        .map_err(|e| DeskError::catalog(format!("Failed to query tables: {e}")))?;

    let entries: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| DeskError::catalog(format!("Failed to fetch table names: {e}")))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| DeskError::catalog(format!("Failed to collect table names: {e}")))?;

    let mut tables = Vec::with_capacity(entries.len());
    for (name, kind) in entries {
        let Some(kind) = TableKind::from_catalog(&kind) else {
            continue;
        };
        let row_count = count_rows(conn, &name).map_err(|e| match e {
            DeskError::Execution(msg) => DeskError::catalog(msg),
            other => other,
        })?;
        tables.push(TableDescriptor { name, kind, row_count });
    }

    debug!(tables = tables.len(), "listed tables");
    Ok(tables)
}

/// Whether `name` is a user-visible table or view
pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(TABLE_EXISTS_SQL, [name], |row| row.get(0))
        .map_err(|e| DeskError::catalog(format!("Failed to look up table {name:?}: {e}")))
}

/// Fail with `UnknownTable` unless `name` exists
pub(crate) fn ensure_table(conn: &Connection, name: &str) -> Result<()> {
    if table_exists(conn, name)? {
        Ok(())
    } else {
        Err(DeskError::unknown_table(name))
    }
}

pub(crate) fn describe_columns(conn: &Connection, name: &str) -> Result<Vec<ColumnDescriptor>> {
    ensure_table(conn, name)?;
    let table = quote(name)?;

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| DeskError::catalog(format!("Failed to prepare table_info for {name}: {e}")))?;

    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnDescriptor {
                name: row.get(1)?,
                declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<_, i64>(3)? != 0,
                is_primary_key: row.get::<_, i64>(5)? > 0, // pk column: position within the key, 0 if not part of it
            })
        })
        .map_err(|e| DeskError::catalog(format!("Failed to query columns for {name}: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DeskError::catalog(format!("Failed to collect columns for {name}: {e}")))?;

    Ok(columns)
}

/// `SELECT COUNT(*)` against a quoted table name
pub(crate) fn count_rows(conn: &Connection, name: &str) -> Result<u64> {
    let table = quote(name)?;
    let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|e| DeskError::execution(format!("Failed to count rows in {name}: {e}")))?;
    Ok(u64::try_from(count).unwrap_or_default())
}
