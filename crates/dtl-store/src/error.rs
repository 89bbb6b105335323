/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested content was not found.
    #[error("content not found: {0}")]
    NotFound(String),

    /// The file name cannot be stored (empty, path separators, `..`).
    #[error("invalid content name: {0:?}")]
    InvalidName(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The at-rest cipher failed.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
