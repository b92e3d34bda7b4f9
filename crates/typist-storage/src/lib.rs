//! Typist Storage crate - SQLite-backed settings persistence and the Profile Store.
//!
//! Provides a WAL-mode SQLite database with migrations, a key-value settings
//! store (with an in-memory fallback), and the Profile Store that owns the
//! built-in profiles plus the single mutable `Custom` profile.

pub mod db;
pub mod migrations;
pub mod profiles;
pub mod settings;

pub use db::Database;
pub use profiles::ProfileStore;
pub use settings::{MemorySettings, SettingsRepository, SettingsStore};
