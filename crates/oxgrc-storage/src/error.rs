/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use oxgrc_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "unified_control",
///     id: "ctrl-99".to_string(),
/// };
/// assert!(err.to_string().contains("unified_control"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A create or update request carried invalid data. No write occurred.
    #[error("Storage: validation failed: {0}")]
    Validation(String),

    /// An insert operation did not return the newly created row, which should be
    /// unreachable under normal conditions.
    #[error("Storage: insert of {entity} succeeded but the row could not be read back")]
    InsertReadback { entity: &'static str },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (e.g. list/config columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

impl StorageError {
    /// True when the error should map to a 404 at the API boundary.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
