//! Named cache storage interface.

use std::sync::Arc;

use async_trait::async_trait;
use offline_core::{RequestKey, StoredResponse};

use crate::error::CacheResult;

/// A store holding named cache generations.
///
/// Operations are atomic per entry; concurrent readers and writers need no
/// further coordination.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if it does not exist.
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>>;

    /// Handle to a generation without creating it. Reads and writes through
    /// it fail with `GenerationNotFound` while the generation is absent.
    fn handle(&self, name: &str) -> Arc<dyn CacheHandle>;

    /// Whether a generation exists.
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Names of every generation in the store.
    async fn names(&self) -> CacheResult<Vec<String>>;

    /// Delete a generation and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> CacheResult<bool>;
}

/// An open cache generation.
#[async_trait]
pub trait CacheHandle: Send + Sync {
    /// Name of the generation.
    fn name(&self) -> &str;

    /// Look up an entry. A missing entry is `Ok(None)`.
    async fn get(&self, key: &RequestKey) -> CacheResult<Option<StoredResponse>>;

    /// Store an entry, replacing any previous entry for the key.
    async fn put(&self, key: &RequestKey, response: StoredResponse) -> CacheResult<()>;

    /// Keys of every entry in the generation.
    async fn keys(&self) -> CacheResult<Vec<String>>;
}
