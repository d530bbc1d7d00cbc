//! Error types for shop-registry

use std::path::PathBuf;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in registry operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying SQLite failure.
    #[error("registry database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer binary.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },

    /// The registry schema has not been provisioned yet.
    #[error("extension registry storage is not provisioned yet")]
    StorageUnavailable,

    /// A mutation targeted a code with no stored record.
    #[error("no extension record for '{code}'")]
    RecordNotFound { code: String },

    /// Extension config could not be encoded.
    #[error("failed to encode extension config: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error preparing the database location.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
