use thiserror::Error;
use uuid::Uuid;

use crate::types::SessionState;

/// Top-level error type for the Typist system.
///
/// The first group of variants is the command-level taxonomy surfaced to callers.
/// The remaining variants wrap infrastructure failures so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TypistError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Busy: session {0} is still active")]
    Busy(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: cannot {command} while {state}")]
    InvalidState {
        command: &'static str,
        state: SessionState,
    },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Injection failure: {0}")]
    Injection(String),

    #[error("Text provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for TypistError {
    fn from(err: toml::de::Error) -> Self {
        TypistError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TypistError {
    fn from(err: toml::ser::Error) -> Self {
        TypistError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TypistError {
    fn from(err: serde_json::Error) -> Self {
        TypistError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Typist operations.
pub type Result<T> = std::result::Result<T, TypistError>;
