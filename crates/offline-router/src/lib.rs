//! Request routing for the offline intermediary.
//!
//! This crate provides:
//! - `Classifier` / `Destination` - Host-based request classification
//! - `Strategy` / `CacheStatus` - Network-only, cache-first and network-first
//! - `Fetcher` - The network primitive, with a Spin implementation on wasm32
//! - `RequestRouter` - Per-request strategy dispatch
//! - `OfflineWorker` - Setup, promote and intercept entry points
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use offline_cache::{KvCacheStorage, MemoryKv};
//! use offline_core::{OfflineConfig, Request};
//! use offline_router::{Interception, OfflineWorker, SpinFetcher};
//!
//! let storage = Arc::new(KvCacheStorage::new(MemoryKv::new()));
//! let worker = OfflineWorker::new(OfflineConfig::default(), storage, Arc::new(SpinFetcher))?;
//!
//! worker.setup().await?;
//! worker.promote().await?;
//!
//! match worker.intercept(Request::get("http://localhost/index.html")?).await {
//!     Interception::Respond(result) => { /* hand back to the page */ }
//!     Interception::Passthrough(request) => { /* host fetches it */ }
//! }
//! ```

mod classify;
mod fetch;
mod router;
mod strategy;
mod worker;

pub mod testing;

pub use classify::*;
pub use fetch::*;
pub use router::*;
pub use strategy::*;
pub use worker::*;
