use oxgrc_storage::StorageError;

/// Errors surfaced by domain operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity id does not resolve.
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The request carried invalid data. No write occurred.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The storage layer failed. Bubbles up to the caller as-is.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
