//! Generic Relational Data Access
//!
//! This module defines the data model exchanged with callers and the components
//! that run arbitrary SQL and schema-driven CRUD against the embedded store
//! without knowing table shapes ahead of time.
//!
//! # Components
//! - [`Store`] - the single connection handle, injected into every component
//! - [`SchemaCatalog`] - live table/column introspection
//! - [`identifier`] - identifier validation and quoting
//! - [`QueryExecutor`] - raw SQL execution into a uniform [`QueryResult`]
//! - [`RowMutator`] - parameterized insert/update/delete
//! - [`PaginationEngine`] - bounded table slices plus a total count
//!
//! # Consistency
//! Each operation is a synchronous call against the store. Row counts and data
//! pages are separate statements and are not snapshotted together.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

pub mod catalog;
pub mod executor;
pub mod identifier;
pub mod mutator;
pub mod pagination;
pub mod store;

pub use catalog::SchemaCatalog;
pub use executor::QueryExecutor;
pub use mutator::{MutationOutcome, RowMutator};
pub use pagination::{PageRequest, PaginationEngine};
pub use store::Store;

/// Catalog object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Base table
    Table,
    /// View
    View,
}

impl TableKind {
    /// Parse the `type` column of `sqlite_master`
    #[must_use]
    pub fn from_catalog(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(Self::Table),
            "view" => Some(Self::View),
            _ => None,
        }
    }
}

/// One user-visible table or view, annotated with its live row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    /// Table name
    pub name: String,

    /// Table or view
    pub kind: TableKind,

    /// Row count at the time of the call
    pub row_count: u64,
}

/// Column metadata, ordered by physical column position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Declared type as written in the table definition (may be empty)
    pub declared_type: String,

    /// Whether the column is part of the primary key
    pub is_primary_key: bool,

    /// Whether the column has a NOT NULL constraint
    pub not_null: bool,
}

/// Uniform result envelope for raw SQL execution
///
/// Every row has exactly `columns.len()` values. Mutating statements return
/// `["affected_rows", "last_insert_id"]` and a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column names, unique within the result
    pub columns: Vec<String>,

    /// Result rows in column order
    pub rows: Vec<Vec<Value>>,

    /// Rows returned (reads) or rows affected (mutations)
    pub row_count: u64,

    /// Wall-clock execution time in whole milliseconds
    pub execution_time_ms: u64,
}

/// Column names of the mutating-statement envelope
pub const MUTATION_COLUMNS: [&str; 2] = ["affected_rows", "last_insert_id"];

/// One table row as an ordered list of (column, value) pairs
///
/// Serializes as a JSON object whose keys keep the record's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord(Vec<(String, Value)>);

impl RowRecord {
    /// Create an empty record
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a column value, replacing an earlier value for the same column
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        if let Some(slot) = self.0.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.0.push((column, value));
        }
    }

    /// Builder-style [`RowRecord::insert`]
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.insert(column, value);
        self
    }

    /// Value for a column, if present
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    /// Column names in record order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// (column, value) pairs in record order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns in the record
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RowRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object mapping column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<RowRecord, A::Error> {
                let mut record = RowRecord::new();
                while let Some((column, value)) = access.next_entry::<String, Value>()? {
                    record.insert(column, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Paginated slice of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Rows of the requested slice
    pub data: Vec<RowRecord>,

    /// Table row count from an independent count query
    pub total: u64,
}

/// Value of the `id` column addressed by update/delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowId {
    /// Integer key (the common `INTEGER PRIMARY KEY` case)
    Integer(i64),
    /// Any other key, bound as text
    Text(String),
}

impl From<&str> for RowId {
    fn from(raw: &str) -> Self {
        raw.parse::<i64>().map_or_else(|_| Self::Text(raw.to_string()), Self::Integer)
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}
