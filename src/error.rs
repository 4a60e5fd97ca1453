//! Error types for the record store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Data corruption in collection '{collection}': {reason}")]
    DataCorruption { collection: String, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] BackendError),

    #[error("No data to export in collection '{0}'")]
    NoData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl StoreError {
    pub(crate) fn corruption(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::DataCorruption {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors raised by key-value backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch for key '{key}': expected {expected}, got {got}")]
    ChecksumMismatch { key: String, expected: u32, got: u32 },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
