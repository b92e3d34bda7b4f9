//! Key-value settings persistence.
//!
//! `SettingsStore` is the configuration persistence collaborator: a plain
//! string get/set. `SettingsRepository` stores values in SQLite and
//! `MemorySettings` keeps them in a map for tests and as the fallback when no
//! database can be opened.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rusqlite::OptionalExtension;

use typist_core::error::TypistError;

use crate::db::Database;

/// Simple string key-value persistence.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, TypistError>;
    fn set(&self, key: &str, value: &str) -> Result<(), TypistError>;
}

/// SQLite-backed settings.
pub struct SettingsRepository {
    db: Arc<Database>,
}

impl SettingsRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl SettingsStore for SettingsRepository {
    fn get(&self, key: &str) -> Result<Option<String>, TypistError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TypistError::Storage(format!("Failed to read setting {}: {}", key, e)))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TypistError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                rusqlite::params![key, value],
            )
            .map_err(|e| TypistError::Storage(format!("Failed to write setting {}: {}", key, e)))?;
            Ok(())
        })
    }
}

/// In-memory settings.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<String>, TypistError> {
        let values = self
            .values
            .read()
            .map_err(|e| TypistError::Storage(format!("Lock poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TypistError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| TypistError::Storage(format!("Lock poisoned: {}", e)))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_repo() -> SettingsRepository {
        SettingsRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_repository_get_missing() {
        let repo = make_repo();
        assert_eq!(repo.get("nope").unwrap(), None);
    }

    #[test]
    fn test_repository_set_then_get() {
        let repo = make_repo();
        repo.set("profiles.custom", "{}").unwrap();
        assert_eq!(repo.get("profiles.custom").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_repository_overwrite() {
        let repo = make_repo();
        repo.set("k", "one").unwrap();
        repo.set("k", "two").unwrap();
        assert_eq!(repo.get("k").unwrap().as_deref(), Some("two"));

        let rows: i64 = repo
            .db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
                    .map_err(|e| TypistError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_repository_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typist.db");
        {
            let repo = SettingsRepository::new(Arc::new(Database::new(&path).unwrap()));
            repo.set("session.last_used", "Fast").unwrap();
        }
        let repo = SettingsRepository::new(Arc::new(Database::new(&path).unwrap()));
        assert_eq!(repo.get("session.last_used").unwrap().as_deref(), Some("Fast"));
    }

    #[test]
    fn test_memory_settings() {
        let store = MemorySettings::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    }
}
