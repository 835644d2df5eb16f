//! Cache error types.

use offline_core::BodyError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur when using the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be reached.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// Failed to encode or decode a stored entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read the response body being stored.
    #[error("body error: {0}")]
    Body(#[from] BodyError),

    /// Backend storage operation failed.
    #[error("store operation failed: {0}")]
    Storage(String),

    /// The generation was deleted.
    #[error("cache generation not found: {0}")]
    GenerationNotFound(String),
}
