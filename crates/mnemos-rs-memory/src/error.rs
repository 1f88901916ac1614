//! Error types for memory operations.

use uuid::Uuid;

/// Errors returned by memory stores and helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Record input failed validation.
    #[error("invalid memory record: {0}")]
    Validation(String),
    /// A record with the same name already exists in the same scope.
    #[error("memory record already exists in scope: {name}")]
    Duplicate { name: String },
    /// Record id is unknown to the store.
    #[error("memory record not found: {0}")]
    NotFound(Uuid),
    /// Backend-specific storage failure.
    #[error("store error: {0}")]
    Store(String),
}
