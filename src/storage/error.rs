//! Storage error taxonomy shared by every persistence layer.

use thiserror::Error;

/// Errors surfaced by the key-value adapter, the data manager, the blob
/// store and the photo facade.
///
/// Deleting an id that does not exist is never an error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Platform storage is disabled, full, or could not be opened.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Entity rejected before any write was attempted.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Primary-key collision on a blob insert.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// File could not be converted to its persisted encoding.
    #[error("Encoding failed: {0}")]
    EncodingError(String),

    /// Targeted update of an entity that does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Stored data was written by a newer schema than this build knows.
    #[error("Unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// Stored JSON could not be parsed or produced.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether the error came from the platform rather than the caller's data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::StorageUnavailable(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateId(e.to_string())
            }
            other => StorageError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StorageError::StorageUnavailable(format!("Storage task failed: {}", e))
    }
}

/// Convenience alias used throughout the storage layers.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_maps_to_duplicate() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StorageError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StorageError::DuplicateId(_)));
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: StorageError = serde_json::from_str::<Vec<u32>>("{").unwrap_err().into();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(!err.is_unavailable());
    }
}
