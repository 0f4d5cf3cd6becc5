//! Error types for AtlasDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::keycode::PrimaryKey;

/// Result type alias using DbError
pub type Result<T> = std::result::Result<T, DbError>;

/// Unified error type for AtlasDB operations
#[derive(Debug, Error)]
pub enum DbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Database is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Record {id} not found in collection '{collection}'")]
    NotFound {
        collection: String,
        id: PrimaryKey,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Collection '{collection}' has no index named '{field}'")]
    UnknownIndex { collection: String, field: String },

    #[error("Cursor is not positioned on an entry")]
    CursorNotPositioned,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// True for failures of the underlying storage resource (open, write,
    /// commit, sync) as opposed to caller or record-level errors.
    pub fn is_storage_io(&self) -> bool {
        matches!(
            self,
            DbError::Io(_) | DbError::WalCorruption(_) | DbError::WalWrite(_) | DbError::Storage(_)
        )
    }

    /// True if the error means the requested record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. } | DbError::KeyNotFound)
    }
}
