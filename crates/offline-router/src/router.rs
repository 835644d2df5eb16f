//! Per-request strategy dispatch.

use std::sync::Arc;

use offline_cache::GenerationManager;
use offline_core::{OfflineConfig, Request, Response};
use tracing::Instrument;

use crate::classify::{Classifier, Destination};
use crate::fetch::{FetchError, Fetcher};
use crate::strategy::{CacheStatus, Strategy};

/// Routes each request through the strategy its destination calls for.
///
/// Stateless across requests: the outcome depends only on the request, the
/// network and the current generation. Cache writes are detached and never
/// delay the response.
pub struct RequestRouter {
    classifier: Classifier,
    generations: GenerationManager,
    fetcher: Arc<dyn Fetcher>,
    cache_error_responses: bool,
}

impl RequestRouter {
    /// Create a router.
    pub fn new(
        classifier: Classifier,
        generations: GenerationManager,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            classifier,
            generations,
            fetcher,
            cache_error_responses: true,
        }
    }

    /// Create a router from config.
    pub fn from_config(
        config: &OfflineConfig,
        generations: GenerationManager,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self::new(Classifier::from_config(config), generations, fetcher)
            .with_cache_error_responses(config.network_first.cache_error_responses)
    }

    /// Whether network-first also caches non-2xx responses.
    pub fn with_cache_error_responses(mut self, enabled: bool) -> Self {
        self.cache_error_responses = enabled;
        self
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// The generation manager in use.
    pub fn generations(&self) -> &GenerationManager {
        &self.generations
    }

    /// Classify a request without dispatching it.
    pub fn plan(&self, request: &Request) -> (Destination, Strategy) {
        let destination = self.classifier.classify(request.uri());
        (destination, destination.strategy())
    }

    /// Classify and serve a request.
    pub async fn route(&self, request: Request) -> Result<Response, FetchError> {
        let (destination, strategy) = self.plan(&request);
        let span = tracing::debug_span!(
            "intercept",
            method = %request.method(),
            url = %request.uri(),
            %destination,
            %strategy,
        );

        async move {
            let result = match strategy {
                Strategy::NetworkOnly => self.network_only(request).await,
                Strategy::CacheFirst => self.cache_first(request).await,
                Strategy::NetworkFirst => self.network_first(request).await,
            };

            match &result {
                Ok(response) => tracing::debug!(
                    status = response.status().as_u16(),
                    cache = response.cache_status().unwrap_or("-"),
                    "request served"
                ),
                Err(e) => tracing::debug!(error = %e, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Network-only: the fetch result goes straight back.
    pub async fn network_only(&self, request: Request) -> Result<Response, FetchError> {
        let response = self.fetcher.fetch(request).await?;
        Ok(response.with_cache_status(CacheStatus::Bypass.as_str()))
    }

    /// Cache-first: serve a hit; on a miss fetch, return, and refill.
    pub async fn cache_first(&self, request: Request) -> Result<Response, FetchError> {
        let key = request.key();

        if let Some(cached) = self.generations.get(&key).await {
            return Ok(cached.with_cache_status(CacheStatus::Hit.as_str()));
        }

        let response = self.fetcher.fetch(request).await?;
        let (returned, stored) = response.tee();
        self.generations.populate_detached(key, stored);
        Ok(returned.with_cache_status(CacheStatus::Miss.as_str()))
    }

    /// Network-first: fetch and refill; fall back to the cache only when
    /// the fetch itself fails.
    pub async fn network_first(&self, request: Request) -> Result<Response, FetchError> {
        let key = request.key();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let response = if response.is_ok() || self.cache_error_responses {
                    let (returned, stored) = response.tee();
                    self.generations.populate_detached(key, stored);
                    returned
                } else {
                    response
                };
                Ok(response.with_cache_status(CacheStatus::Miss.as_str()))
            }
            Err(err) => match self.generations.get(&key).await {
                Some(cached) => {
                    tracing::debug!(error = %err, "network failed, serving cached copy");
                    Ok(cached.with_cache_status(CacheStatus::Fallback.as_str()))
                }
                None => Err(err),
            },
        }
    }

    /// Wait for detached cache writes spawned so far.
    pub async fn flush_population(&self) -> usize {
        self.generations.flush().await
    }
}
