//! Lifecycle entry points: setup, promote and intercept.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::try_join_all;
use offline_cache::{CacheError, CacheStorage, GenerationManager};
use offline_core::{
    ConfigError, LifecyclePhase, Method, OfflineConfig, Request, RequestKey, Response,
    StoredResponse, WorkerState,
};

use crate::fetch::{FetchError, Fetcher};
use crate::router::RequestRouter;

/// Error type for lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to pre-cache {path}: {reason}")]
    Precache { path: String, reason: String },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot promote from state {0}")]
    NotInstalled(WorkerState),
}

/// Outcome of handing a request to the worker.
#[derive(Debug)]
pub enum Interception {
    /// The worker produced the result.
    Respond(Result<Response, FetchError>),
    /// The worker declined; the host should issue the request itself.
    Passthrough(Request),
}

impl Interception {
    /// Whether the worker declined the request.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }

    /// The routed result, if the worker handled the request.
    pub fn into_result(self) -> Option<Result<Response, FetchError>> {
        match self {
            Self::Respond(result) => Some(result),
            Self::Passthrough(_) => None,
        }
    }
}

/// The intermediary as the host sees it.
///
/// The host calls [`setup`](Self::setup) once when the worker is deployed,
/// [`promote`](Self::promote) when it takes over, and
/// [`intercept`](Self::intercept) for every outbound request afterwards.
pub struct OfflineWorker {
    config: OfflineConfig,
    generations: GenerationManager,
    fetcher: Arc<dyn Fetcher>,
    router: RequestRouter,
    state: Mutex<WorkerState>,
}

impl OfflineWorker {
    /// Create a worker over `storage` and `fetcher`.
    pub fn new(
        config: OfflineConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, SetupError> {
        config.validate()?;

        let generations = GenerationManager::new(storage, config.version.clone());
        let router =
            RequestRouter::from_config(&config, generations.clone(), Arc::clone(&fetcher));

        Ok(Self {
            config,
            generations,
            fetcher,
            router,
            state: Mutex::new(WorkerState::default()),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The config in use.
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// The router requests are dispatched through.
    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// The generation manager for this worker's version.
    pub fn generations(&self) -> &GenerationManager {
        &self.generations
    }

    /// Create the current generation and pre-cache the app shell.
    ///
    /// Every pre-cache path is fetched before anything is written; one
    /// failure or non-ok status aborts setup with nothing stored. On
    /// success the worker is immediately eligible for promotion.
    pub async fn setup(&self) -> Result<usize, SetupError> {
        self.transition(LifecyclePhase::Setup, WorkerState::Installing);

        match self.install().await {
            Ok(count) => {
                self.transition(LifecyclePhase::Setup, WorkerState::Installed);
                tracing::info!(generation = %self.config.version, entries = count, "pre-cache complete");
                Ok(count)
            }
            Err(e) => {
                self.transition(LifecyclePhase::Setup, WorkerState::Parsed);
                tracing::warn!(generation = %self.config.version, error = %e, "setup failed");
                Err(e)
            }
        }
    }

    /// Prune stale generations and start intercepting.
    ///
    /// Returns the generations that were removed. A failure to prune is
    /// logged; the worker still takes over.
    pub async fn promote(&self) -> Result<Vec<String>, SetupError> {
        let state = self.state();
        if !state.can_promote() {
            return Err(SetupError::NotInstalled(state));
        }

        self.transition(LifecyclePhase::Promote, WorkerState::Activating);
        let removed = match self.generations.prune_stale_generations().await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(generation = %self.config.version, error = %e, "failed to list generations for pruning");
                Vec::new()
            }
        };
        self.transition(LifecyclePhase::Promote, WorkerState::Activated);

        Ok(removed)
    }

    /// Handle one outbound request.
    ///
    /// Before promotion, and for schemes other than http(s), the request is
    /// handed back untouched.
    pub async fn intercept(&self, request: Request) -> Interception {
        let state = self.state();
        if !state.can_intercept() {
            tracing::debug!(%state, url = %request.uri(), "not active, passing through");
            return Interception::Passthrough(request);
        }
        if !request.is_http() {
            tracing::debug!(url = %request.uri(), "non-http scheme, passing through");
            return Interception::Passthrough(request);
        }

        Interception::Respond(self.router.route(request).await)
    }

    /// Wait for detached cache writes.
    pub async fn flush_population(&self) -> usize {
        self.router.flush_population().await
    }

    async fn install(&self) -> Result<usize, SetupError> {
        let handle = self.generations.ensure_current_generation().await?;

        let targets = self
            .config
            .precache
            .iter()
            .map(|path| self.config.resolve(path).map(|uri| (path.as_str(), uri)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let fetched = try_join_all(
            targets
                .into_iter()
                .map(|(path, uri)| self.precache_one(path, Request::new(Method::GET, uri))),
        )
        .await?;

        let count = fetched.len();
        for (key, stored) in fetched {
            handle.put(&key, stored).await?;
        }
        Ok(count)
    }

    async fn precache_one(
        &self,
        path: &str,
        request: Request,
    ) -> Result<(RequestKey, StoredResponse), SetupError> {
        let failed = |reason: String| SetupError::Precache {
            path: path.to_string(),
            reason,
        };

        let key = request.key();
        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.is_ok() {
            return Err(failed(format!("status {}", response.status())));
        }

        let stored = StoredResponse::capture(response)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok((key, stored))
    }

    fn transition(&self, phase: LifecyclePhase, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let from = *state;
        tracing::debug!(%phase, %from, to = %next, "lifecycle transition");
        *state = next;
    }
}

impl std::fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineWorker")
            .field("version", &self.config.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
