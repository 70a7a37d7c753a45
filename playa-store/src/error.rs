//! Error types for playa-store.

use playa_client::StoreError;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored timestamp is outside the representable range.
    #[error("invalid timestamp: {0} ms")]
    InvalidTimestamp(i64),

    /// A stored row contradicts the schema.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(e) => StoreError::Database(Box::new(e)),
            other => StoreError::Serialization(other.to_string()),
        }
    }
}
