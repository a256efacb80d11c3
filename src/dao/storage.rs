use std::error::Error;
use thiserror::Error;

/// Result alias for shared-store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by shared-store backends regardless of the underlying datastore.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("shared store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
