//! Destination classification.

use http::Uri;
use offline_core::OfflineConfig;

use crate::strategy::Strategy;

/// Where a request is headed, as far as caching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Live backend data; never cached.
    Realtime,
    /// Stable third-party asset (fonts, CDN libraries).
    ThirdPartyAsset,
    /// Everything else, including the same-origin app shell.
    AppShell,
}

impl Destination {
    /// The strategy used for this destination.
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Realtime => Strategy::NetworkOnly,
            Self::ThirdPartyAsset => Strategy::CacheFirst,
            Self::AppShell => Strategy::NetworkFirst,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::ThirdPartyAsset => "third-party-asset",
            Self::AppShell => "app-shell",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Host allow-lists driving classification.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    realtime_hosts: Vec<String>,
    asset_hosts: Vec<String>,
}

impl Classifier {
    /// Create a classifier from explicit host substrings. Matching ignores
    /// ASCII case.
    pub fn new(realtime_hosts: Vec<String>, asset_hosts: Vec<String>) -> Self {
        Self {
            realtime_hosts: lowercase_all(realtime_hosts),
            asset_hosts: lowercase_all(asset_hosts),
        }
    }

    /// Create a classifier from config.
    pub fn from_config(config: &OfflineConfig) -> Self {
        Self::new(config.realtime_hosts.clone(), config.asset_hosts.clone())
    }

    /// Classify a request URL. First match wins: realtime, then assets,
    /// then the app shell default. URLs without a host are app shell.
    pub fn classify(&self, uri: &Uri) -> Destination {
        let Some(host) = uri.host() else {
            return Destination::AppShell;
        };
        let host = host.to_ascii_lowercase();
        let host = host.as_str();

        if matches_any(host, &self.realtime_hosts) {
            Destination::Realtime
        } else if matches_any(host, &self.asset_hosts) {
            Destination::ThirdPartyAsset
        } else {
            Destination::AppShell
        }
    }
}

fn lowercase_all(hosts: Vec<String>) -> Vec<String> {
    hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect()
}

fn matches_any(host: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| host.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(url: &str) -> Destination {
        let classifier = Classifier::from_config(&OfflineConfig::default());
        classifier.classify(&url.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_supabase_is_realtime() {
        assert_eq!(
            classify("https://xyzcompany.supabase.co/rest/v1/modules"),
            Destination::Realtime
        );
        assert_eq!(
            classify("https://xyzcompany.functions.supabase.co/quiz"),
            Destination::Realtime
        );
    }

    #[test]
    fn test_font_and_cdn_hosts_are_assets() {
        assert_eq!(
            classify("https://fonts.googleapis.com/css2?family=Inter"),
            Destination::ThirdPartyAsset
        );
        assert_eq!(
            classify("https://fonts.gstatic.com/s/inter/v12/a.woff2"),
            Destination::ThirdPartyAsset
        );
        assert_eq!(
            classify("https://cdnjs.cloudflare.com/ajax/libs/chart.js/4.4.0/chart.umd.min.js"),
            Destination::ThirdPartyAsset
        );
    }

    #[test]
    fn test_everything_else_is_app_shell() {
        assert_eq!(classify("https://app.example.com/"), Destination::AppShell);
        assert_eq!(
            classify("https://app.example.com/assets/app.js"),
            Destination::AppShell
        );
        assert_eq!(classify("/index.html"), Destination::AppShell);
    }

    #[test]
    fn test_realtime_wins_over_assets() {
        let classifier = Classifier::new(vec!["example.com".into()], vec!["cdn.example.com".into()]);
        let uri: Uri = "https://cdn.example.com/lib.js".parse().unwrap();
        assert_eq!(classifier.classify(&uri), Destination::Realtime);
    }

    #[test]
    fn test_path_does_not_affect_host_match() {
        assert_eq!(
            classify("https://app.example.com/proxy/supabase.co/data"),
            Destination::AppShell
        );
    }

    #[test]
    fn test_host_match_ignores_case() {
        assert_eq!(
            classify("https://XYZ.Supabase.co/rest/v1/lessons"),
            Destination::Realtime
        );
        assert_eq!(
            classify("https://Fonts.GStatic.com/s/inter/v12/a.woff2"),
            Destination::ThirdPartyAsset
        );
    }

    #[test]
    fn test_configured_hosts_are_case_folded() {
        let classifier = Classifier::new(vec!["Supabase.CO".into()], vec!["CDN.jsdelivr.net".into()]);
        let realtime: Uri = "https://abc.supabase.co/auth/v1/user".parse().unwrap();
        let asset: Uri = "https://cdn.JSDELIVR.net/npm/lib.js".parse().unwrap();
        assert_eq!(classifier.classify(&realtime), Destination::Realtime);
        assert_eq!(classifier.classify(&asset), Destination::ThirdPartyAsset);
    }

    #[test]
    fn test_destination_strategy() {
        assert_eq!(Destination::Realtime.strategy(), Strategy::NetworkOnly);
        assert_eq!(Destination::ThirdPartyAsset.strategy(), Strategy::CacheFirst);
        assert_eq!(Destination::AppShell.strategy(), Strategy::NetworkFirst);
    }
}
