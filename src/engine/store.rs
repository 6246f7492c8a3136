//! `SQLite` Store Handle
//!
//! The store is the single connection to the embedded database. It is opened and
//! closed by the composition root and shared with every data-access component
//! through an `Arc<Store>`.
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, calls block the current thread)
//! - `rusqlite::Connection` is `Send` but not `Sync`, so the handle sits behind a
//!   `Mutex`; SQLite serialises writers itself, this lock only guards the handle
//! - BLOB data is Base64-encoded for JSON safety
//! - Bound parameters accept JSON scalars only

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::engine::RowId;
use crate::error::{DeskError, Result};

/// Sample schema created by [`Store::seed_sample_data`]
const SAMPLE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        email TEXT UNIQUE NOT NULL,
        status TEXT DEFAULT 'active',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES users(id),
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        published BOOLEAN DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL,
        description TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
";

/// Sample rows, inserted only into an empty `users` table
const SAMPLE_ROWS: &str = "
    INSERT INTO users (username, email, status) VALUES
        ('john_doe', 'john@example.com', 'active'),
        ('sarah_smith', 'sarah@example.com', 'active'),
        ('mike_wilson', 'mike@example.com', 'active'),
        ('emma_davis', 'emma@example.com', 'inactive'),
        ('alex_jones', 'alex@example.com', 'active');

    INSERT INTO posts (user_id, title, content, published) VALUES
        (1, 'Getting Started with SQL', 'A comprehensive guide to SQL basics...', 1),
        (1, 'Advanced Query Techniques', 'Learn about complex joins and subqueries...', 1),
        (2, 'Database Design Principles', 'Best practices for designing databases...', 1),
        (3, 'Performance Optimization', 'Tips for optimizing database performance...', 0),
        (1, 'Working with Indexes', 'Understanding how indexes improve query speed...', 1);

    INSERT INTO categories (name, description) VALUES
        ('Technology', 'Posts related to technology and programming'),
        ('Tutorial', 'Step-by-step tutorials and guides'),
        ('Best Practices', 'Industry best practices and recommendations');
";

/// Shared handle to the embedded store
pub struct Store {
    conn: Mutex<Connection>,
    label: String,
}

impl Store {
    /// Open (or create) a database file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeskError::catalog(format!("Could not create data directory: {e}"))
            })?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| DeskError::catalog(format!("Failed to open SQLite database: {e}")))?;

        info!(path = %path.display(), "store opened");
        Ok(Self { conn: Mutex::new(conn), label: path.display().to_string() })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DeskError::catalog(format!("Failed to open in-memory database: {e}")))?;
        Ok(Self { conn: Mutex::new(conn), label: ":memory:".to_string() })
    }

    /// Where the store lives (file path or `:memory:`)
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Close the connection, reporting any close failure
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| DeskError::catalog("store connection lock poisoned"))?;
        conn.close()
            .map_err(|(_, e)| DeskError::catalog(format!("Failed to close SQLite database: {e}")))?;
        info!(store = %self.label, "store closed");
        Ok(())
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DeskError::catalog("store connection lock poisoned"))?;
        f(&conn)
    }

    /// Create the sample `users`/`posts`/`categories` tables and fill an empty `users` table
    pub fn seed_sample_data(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SAMPLE_SCHEMA)
                .map_err(|e| DeskError::execution(format!("Failed to create sample schema: {e}")))?;

            let users: i64 = conn
                .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                .map_err(|e| DeskError::execution(format!("Failed to count users: {e}")))?;

            if users == 0 {
                conn.execute_batch(SAMPLE_ROWS)
                    .map_err(|e| DeskError::execution(format!("Failed to insert sample rows: {e}")))?;
                debug!("sample rows inserted");
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Convert a `SQLite` value to a JSON value
pub(crate) fn sqlite_value_to_json(
    row: &Row,
    idx: usize,
) -> std::result::Result<Value, rusqlite::Error> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => {
            // NaN/Infinity become null
            serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
        }
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => {
            use base64::Engine;
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    })
}

/// Convert a JSON scalar to a bindable `SQLite` value
pub(crate) fn json_to_sql(column: &str, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Real(f))
            } else {
                Err(DeskError::validation(format!("Column '{column}': unsupported number {n}")))
            }
        }
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(DeskError::validation(format!(
            "Column '{column}': arrays and objects cannot be stored"
        ))),
    }
}

/// Bindable value for a row id
pub(crate) fn row_id_to_sql(id: &RowId) -> SqlValue {
    match id {
        RowId::Integer(i) => SqlValue::Integer(*i),
        RowId::Text(s) => SqlValue::Text(s.clone()),
    }
}
