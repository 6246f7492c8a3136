//! Pagination Engine
//!
//! Bounded slices of a table plus a total row count. The count and the page are
//! two separate statements; `total` may disagree with `data` under concurrent
//! writers.

use rusqlite::Connection;
use std::sync::Arc;
use tracing::debug;

use crate::engine::catalog::{count_rows, ensure_table};
use crate::engine::identifier::quote;
use crate::engine::store::sqlite_value_to_json;
use crate::engine::{Page, RowRecord, Store};
use crate::error::{DeskError, Result};

/// Page size used when the caller gives none (or an unusable one)
pub const DEFAULT_LIMIT: u64 = 100;

/// Normalized `limit`/`offset` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum rows to return, always at least 1
    pub limit: u64,

    /// Rows to skip from the start of the table
    pub offset: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT, offset: 0 }
    }
}

impl PageRequest {
    /// Missing, zero or negative `limit` becomes 100; missing or negative `offset` becomes 0
    #[must_use]
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit
            .and_then(|l| u64::try_from(l).ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT);
        let offset = offset.and_then(|o| u64::try_from(o).ok()).unwrap_or(0);
        Self { limit, offset }
    }

    /// Lenient parse of raw query-string values; unparsable input takes the default
    #[must_use]
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self::new(
            limit.and_then(|l| l.trim().parse().ok()),
            offset.and_then(|o| o.trim().parse().ok()),
        )
    }
}

/// Table slicing over the shared store
#[derive(Debug, Clone)]
pub struct PaginationEngine {
    store: Arc<Store>,
}

impl PaginationEngine {
    /// Create a pagination engine over an injected store
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fetch one page of `table` and its current row count
    pub fn page(&self, table: &str, request: PageRequest) -> Result<Page> {
        self.store.with_conn(|conn| {
            ensure_table(conn, table)?;
            let total = count_rows(conn, table)?;
            let data = fetch_rows(conn, table, request)?;

            debug!(table, limit = request.limit, offset = request.offset, rows = data.len(), total, "fetched page");
            Ok(Page { data, total })
        })
    }
}

fn fetch_rows(conn: &Connection, table: &str, request: PageRequest) -> Result<Vec<RowRecord>> {
    let sql = format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", quote(table)?);
    let mut stmt = conn.prepare(&sql).map_err(|e| DeskError::execution(e.to_string()))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    // SQLite integers are signed; clamp rather than wrap
    let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);

    let rows = stmt
        .query_map([limit, offset], |row| {
            names
                .iter()
                .enumerate()
                .map(|(idx, name)| sqlite_value_to_json(row, idx).map(|value| (name.clone(), value)))
                .collect::<std::result::Result<RowRecord, rusqlite::Error>>()
        })
        .map_err(|e| DeskError::execution(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DeskError::execution(e.to_string()))?;

    Ok(rows)
}
