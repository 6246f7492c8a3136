//! Saved query metadata
//!
//! A process-local key-value store of named SQL snippets. Contents are lost on
//! restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{DeskError, Result};

/// A stored query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    /// Random v4 UUID assigned on save
    pub id: String,

    /// Display name
    pub name: String,

    /// Statement text, stored verbatim
    pub sql: String,

    /// Owning user, when the caller supplied one
    pub user_id: Option<String>,

    /// When the query was saved
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when saving
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedQuery {
    /// Display name, required
    pub name: String,
    /// Statement text, required
    pub sql: String,
    /// Owning user
    #[serde(default)]
    pub user_id: Option<String>,
}

/// In-memory saved query map keyed by id
#[derive(Debug, Default)]
pub struct SavedQueryStore {
    queries: RwLock<HashMap<String, SavedQuery>>,
}

impl SavedQueryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All queries, oldest first, optionally restricted to one user
    pub fn list(&self, user_id: Option<&str>) -> Result<Vec<SavedQuery>> {
        let queries = self.queries.read().map_err(|_| poisoned())?;
        let mut list: Vec<SavedQuery> = queries
            .values()
            .filter(|q| user_id.map_or(true, |user| q.user_id.as_deref() == Some(user)))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// Store a query under a fresh id
    pub fn save(&self, new: NewSavedQuery) -> Result<SavedQuery> {
        if new.name.trim().is_empty() {
            return Err(DeskError::validation("Query name is required"));
        }
        if new.sql.trim().is_empty() {
            return Err(DeskError::validation("SQL query is required"));
        }

        let query = SavedQuery {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            sql: new.sql,
            user_id: new.user_id,
            created_at: Utc::now(),
        };

        self.queries
            .write()
            .map_err(|_| poisoned())?
            .insert(query.id.clone(), query.clone());
        Ok(query)
    }

    /// Remove a query; unknown ids are not an error
    pub fn delete(&self, id: &str) -> Result<()> {
        self.queries.write().map_err(|_| poisoned())?.remove(id);
        Ok(())
    }
}

fn poisoned() -> DeskError {
    DeskError::catalog("saved query store lock poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn new_query(name: &str, sql: &str, user: Option<&str>) -> NewSavedQuery {
        NewSavedQuery { name: name.into(), sql: sql.into(), user_id: user.map(String::from) }
    }

    #[test]
    fn test_save_then_listed() {
        let store = SavedQueryStore::new();
        let saved = store.save(new_query("active", "SELECT * FROM users WHERE status = 'active'", None)).unwrap();

        assert!(Uuid::parse_str(&saved.id).is_ok());
        assert_eq!(saved.user_id, None);
        assert_eq!(store.list(None).unwrap(), vec![saved]);
    }

    #[test]
    fn test_list_in_creation_order() {
        let store = SavedQueryStore::new();
        let first = store.save(new_query("a", "SELECT 1", None)).unwrap();
        let second = store.save(new_query("b", "SELECT 2", Some("default-user"))).unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at <= all[1].created_at);
        assert!(all.contains(&first) && all.contains(&second));

        assert_eq!(store.list(Some("default-user")).unwrap(), vec![second]);
        assert!(store.list(Some("nobody")).unwrap().is_empty());
    }

    #[test]
    fn test_save_requires_name_and_sql() {
        let store = SavedQueryStore::new();
        assert!(matches!(store.save(new_query(" ", "SELECT 1", None)).unwrap_err(), DeskError::Validation(_)));
        assert!(matches!(store.save(new_query("x", "", None)).unwrap_err(), DeskError::Validation(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = SavedQueryStore::new();
        let saved = store.save(new_query("a", "SELECT 1", None)).unwrap();
        let kept = store.save(new_query("b", "SELECT 2", None)).unwrap();

        store.delete(&saved.id).unwrap();
        store.delete(&saved.id).unwrap();
        assert_eq!(store.list(None).unwrap(), vec![kept]);
    }

    #[test]
    fn test_new_saved_query_from_json() {
        let new: NewSavedQuery =
            serde_json::from_str(r#"{"name": "n", "sql": "SELECT 1", "userId": "u1"}"#).unwrap();
        assert_eq!(new.user_id.as_deref(), Some("u1"));
        assert!(serde_json::from_str::<NewSavedQuery>(r#"{"name": "n"}"#).is_err());
    }
}
