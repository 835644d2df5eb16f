//! Intermediary configuration.

use std::path::Path;

use http::Uri;
use serde::{Deserialize, Serialize};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the offline intermediary.
///
/// The version tag is the identity of the current cache generation; bump it
/// on every deployed revision so stale generations are pruned on promote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Current cache generation tag.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin the app is served from; pre-cache paths resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths fetched and stored during setup.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Host substrings whose data must always be live.
    #[serde(default = "default_realtime_hosts")]
    pub realtime_hosts: Vec<String>,

    /// Host substrings serving stable third-party assets.
    #[serde(default = "default_asset_hosts")]
    pub asset_hosts: Vec<String>,

    /// Network-first strategy settings.
    #[serde(default)]
    pub network_first: NetworkFirstConfig,
}

/// Settings for the network-first strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFirstConfig {
    /// Also cache non-2xx responses.
    #[serde(default = "default_true")]
    pub cache_error_responses: bool,
}

impl Default for NetworkFirstConfig {
    fn default() -> Self {
        Self {
            cache_error_responses: true,
        }
    }
}

fn default_version() -> String {
    "lf-v1".to_string()
}

fn default_origin() -> String {
    "http://localhost".to_string()
}

fn default_precache() -> Vec<String> {
    vec!["/".to_string(), "/index.html".to_string()]
}

fn default_realtime_hosts() -> Vec<String> {
    vec!["supabase.co".to_string()]
}

fn default_asset_hosts() -> Vec<String> {
    vec![
        "fonts.googleapis.com".to_string(),
        "fonts.gstatic.com".to_string(),
        "cdnjs.cloudflare.com".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            precache: default_precache(),
            realtime_hosts: default_realtime_hosts(),
            asset_hosts: default_asset_hosts(),
            network_first: NetworkFirstConfig::default(),
        }
    }
}

impl OfflineConfig {
    /// Create the default config for an app served from `origin`.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Default::default()
        }
    }

    /// Set the generation version tag.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replace the pre-cache path list.
    pub fn with_precache(mut self, paths: Vec<&str>) -> Self {
        self.precache = paths.into_iter().map(String::from).collect();
        self
    }

    /// Load config from a file (JSON if the path ends in `.json`, TOML otherwise).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display,
                reason: e.to_string(),
            })?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display,
                reason: e.to_string(),
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check the config for values the intermediary cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version tag must not be empty".into()));
        }

        let origin = self
            .origin
            .parse::<Uri>()
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)))?;
        if origin.scheme().is_none() || origin.authority().is_none() {
            return Err(ConfigError::Invalid(format!(
                "origin '{}' must include a scheme and host",
                self.origin
            )));
        }

        if let Some(path) = self.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "pre-cache path '{}' must start with '/'",
                path
            )));
        }

        let mut hosts = self.realtime_hosts.iter().chain(&self.asset_hosts);
        if hosts.any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid("host patterns must not be empty".into()));
        }

        Ok(())
    }

    /// Resolve a pre-cache path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Uri, ConfigError> {
        let url = format!("{}{}", self.origin.trim_end_matches('/'), path);
        url.parse::<Uri>()
            .map_err(|e| ConfigError::Invalid(format!("pre-cache URL '{}': {}", url, e)))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployed_constants() {
        let config = OfflineConfig::default();
        assert_eq!(config.version, "lf-v1");
        assert_eq!(config.precache, vec!["/", "/index.html"]);
        assert_eq!(config.realtime_hosts, vec!["supabase.co"]);
        assert_eq!(config.asset_hosts.len(), 3);
        assert!(config.network_first.cache_error_responses);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: OfflineConfig = toml::from_str(
            r#"
            version = "lf-v2"
            origin = "https://app.example.com"

            [network_first]
            cache_error_responses = false
            "#,
        )
        .unwrap();

        assert_eq!(config.version, "lf-v2");
        assert_eq!(config.precache, vec!["/", "/index.html"]);
        assert!(!config.network_first.cache_error_responses);
    }

    #[test]
    fn test_resolve_joins_origin_and_path() {
        let config = OfflineConfig::for_origin("https://app.example.com/");
        let uri = config.resolve("/index.html").unwrap();
        assert_eq!(uri.to_string(), "https://app.example.com/index.html");
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let config = OfflineConfig::default().with_version(" ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_relative_origin() {
        let config = OfflineConfig::for_origin("/app");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_precache_path() {
        let config = OfflineConfig::default().with_precache(vec!["index.html"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_host_pattern() {
        let mut config = OfflineConfig::default();
        config.asset_hosts.push(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = std::env::temp_dir().join(format!("offline-core-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("offline.json");

        let config = OfflineConfig::for_origin("https://app.example.com").with_version("lf-v7");
        config.save(&path).unwrap();
        let loaded = OfflineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let err = OfflineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
