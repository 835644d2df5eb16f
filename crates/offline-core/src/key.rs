//! Request identity used as the cache lookup key.

use http::{Method, Uri};
use serde::{Deserialize, Serialize};

/// Cache key derived from a request's method and full URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    key: String,
    cacheable: bool,
}

impl RequestKey {
    /// Build the key for a request.
    pub fn new(method: &Method, uri: &Uri) -> Self {
        Self {
            key: format!("{} {}", method, uri),
            cacheable: *method == Method::GET,
        }
    }

    /// Key for a GET of `uri`.
    pub fn get(uri: &Uri) -> Self {
        Self::new(&Method::GET, uri)
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Whether the cache accepts entries under this key (GET only).
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}
