//! SQLite handle behind the settings store.
//!
//! Typist keeps only small key-value rows (the Custom profile, last-used
//! session settings), so one connection serialised by a mutex is enough.
//! File databases run in WAL mode; every open brings the schema up to date.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use typist_core::error::TypistError;

use crate::migrations;

/// How long a write waits for another process holding the file lock.
const BUSY_TIMEOUT_MS: u32 = 2_000;

fn storage_err(context: &str, e: rusqlite::Error) -> TypistError {
    TypistError::Storage(format!("{}: {}", context, e))
}

/// The settings database. Cheap to share behind an `Arc`.
pub struct Database {
    conn: Mutex<Connection>,
    location: String,
}

impl Database {
    /// Open or create the settings database at `path`, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, TypistError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| storage_err("Cannot open settings database", e))?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))
        .map_err(|e| storage_err("Cannot configure settings database", e))?;

        let db = Self::prepare(conn, path.display().to_string())?;
        info!(path = %db.location, "Settings database ready");
        Ok(db)
    }

    /// A private database that lives as long as this value. Used in tests.
    pub fn in_memory() -> Result<Self, TypistError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| storage_err("Cannot open in-memory settings database", e))?;
        Self::prepare(conn, ":memory:".to_string())
    }

    fn prepare(conn: Connection, location: String) -> Result<Self, TypistError> {
        migrations::run_migrations(&conn)?;
        debug!(location = %location, "Settings schema up to date");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Where the database lives, or `:memory:`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run `f` with exclusive use of the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TypistError>
    where
        F: FnOnce(&Connection) -> Result<T, TypistError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TypistError::Storage(format!("Settings database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish()
    }
}
