//! Versioned cache generations for the offline request intermediary.
//!
//! This crate provides:
//! - `CacheStorage` / `CacheHandle` - Named generations of stored responses
//! - `KvCacheStorage` - Generations laid out over a flat key-value store
//! - `MemoryKv` - In-memory backend with call counters
//! - `GenerationManager` - Current-generation reads, writes and pruning
//! - `Spawner` - Where detached cache writes run
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use offline_cache::{GenerationManager, KvCacheStorage, MemoryKv};
//!
//! let storage = Arc::new(KvCacheStorage::new(MemoryKv::new()));
//! let generations = GenerationManager::new(storage, "lf-v2");
//!
//! generations.ensure_current_generation().await?;
//! let removed = generations.prune_stale_generations().await?;
//! ```

mod error;
mod generation;
mod kv;
mod spawn;
mod storage;

pub use error::*;
pub use generation::*;
pub use kv::*;
pub use spawn::*;
pub use storage::*;
