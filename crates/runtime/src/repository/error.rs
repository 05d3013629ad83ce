//! Error types raised by repository implementations.

use thiserror::Error;

use game_core::StoreError;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("key/value repository lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl RepositoryError {
    /// Converts to the storage capability error reported to the core.
    pub fn into_store_error(self, key: &str) -> StoreError {
        StoreError::backend(key, self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
