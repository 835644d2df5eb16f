//! Core types for the offline request intermediary.
//!
//! This crate provides:
//! - `Request` / `Response` - Outbound requests and single-consume responses
//! - `Body` - Response bodies with `tee` duplication
//! - `StoredResponse` - Immutable response snapshots held by the cache
//! - `RequestKey` - Cache identity of a request
//! - `OfflineConfig` - Version tag, pre-cache list and host allow-lists
//! - `WorkerState` - Lifecycle tracking

mod body;
mod config;
mod key;
mod lifecycle;
mod message;

pub use body::*;
pub use config::*;
pub use key::*;
pub use lifecycle::*;
pub use message::*;

// Re-export the http types that appear in the public API
pub use http::{HeaderMap, Method, StatusCode, Uri};
