/// Errors raised by the local queue store.
///
/// Any of these during `enqueue` means the sample is lost; during `purge`
/// after a confirmed delivery it means the batch will be delivered again.
///
/// # Examples
///
/// ```rust
/// use pulse_storage::error::StorageError;
///
/// let err = StorageError::Other("disk quota exceeded".to_string());
/// assert!(err.to_string().contains("quota"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error (disk full, permission, corruption).
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Payload could not be encoded for storage.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The directory holding the database could not be prepared.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
