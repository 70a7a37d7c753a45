//! Error types for playa.

use thiserror::Error;

/// Errors that can occur when encoding or decoding playa data.
#[derive(Debug, Error)]
pub enum PlayaError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Unknown content type name
    #[error("unknown content type: {0}")]
    UnknownContentType(String),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PlayaError::UnknownContentType("lasers".into());
        assert_eq!(err.to_string(), "unknown content type: lasers");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PlayaError>();
    }
}
