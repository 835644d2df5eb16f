//! Worker lifecycle tracking.

use serde::{Deserialize, Serialize};

/// Lifecycle hooks the host delivers to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    /// Create the current generation and pre-cache the app shell.
    Setup,
    /// Prune stale generations, then claim interception.
    Promote,
    /// Route one outbound request.
    Intercept,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Promote => write!(f, "promote"),
            Self::Intercept => write!(f, "intercept"),
        }
    }
}

/// Worker state across lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, setup not yet run (or last setup failed).
    #[default]
    Parsed,
    /// Setup in progress.
    Installing,
    /// Setup finished; eligible for promote right away.
    Installed,
    /// Pruning stale generations.
    Activating,
    /// Intercepting requests.
    Activated,
}

impl WorkerState {
    /// Whether `promote` may run from this state.
    pub fn can_promote(&self) -> bool {
        matches!(self, Self::Installed | Self::Activated)
    }

    /// Whether requests are routed through the intermediary.
    pub fn can_intercept(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_activated_intercepts() {
        assert!(!WorkerState::Parsed.can_intercept());
        assert!(!WorkerState::Installed.can_intercept());
        assert!(!WorkerState::Activating.can_intercept());
        assert!(WorkerState::Activated.can_intercept());
    }

    #[test]
    fn test_promote_requires_install() {
        assert!(!WorkerState::Parsed.can_promote());
        assert!(!WorkerState::Installing.can_promote());
        assert!(WorkerState::Installed.can_promote());
        assert!(WorkerState::Activated.can_promote());
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkerState::Activating.to_string(), "activating");
        assert_eq!(LifecyclePhase::Promote.to_string(), "promote");
    }
}
