//! Caching strategies and cache status reporting.

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Always go to the network; never touch the cache.
    NetworkOnly,
    /// Serve from cache; on a miss fetch and refill.
    CacheFirst,
    /// Fetch and refill; on a transport failure serve from cache.
    NetworkFirst,
}

impl Strategy {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkOnly => "network-only",
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a routed response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the current generation.
    Hit,
    /// Served from the network (and queued for caching where applicable).
    Miss,
    /// Cache not consulted.
    Bypass,
    /// Network failed; served from the current generation.
    Fallback,
}

impl CacheStatus {
    /// Header value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
            Self::Fallback => "FALLBACK",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(Strategy::NetworkOnly.to_string(), "network-only");
        assert_eq!(Strategy::CacheFirst.to_string(), "cache-first");
        assert_eq!(Strategy::NetworkFirst.to_string(), "network-first");
    }

    #[test]
    fn test_cache_status_header_values() {
        let values: Vec<_> = [
            CacheStatus::Hit,
            CacheStatus::Miss,
            CacheStatus::Bypass,
            CacheStatus::Fallback,
        ]
        .iter()
        .map(CacheStatus::as_str)
        .collect();
        assert_eq!(values, ["HIT", "MISS", "BYPASS", "FALLBACK"]);
    }
}
