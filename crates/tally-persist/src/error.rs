//! Error types for snapshot persistence.

use thiserror::Error;

/// Result type alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors that can occur while dumping, restoring, or probing a backend.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("no database configured")]
    NotConfigured,
}

/// Convert any `Display` error into a `PersistError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::PersistError::$variant(e.to_string())
    };
}

pub(crate) use map_err;
