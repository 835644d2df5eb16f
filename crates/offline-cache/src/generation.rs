//! Current cache generation management.

use std::sync::{Arc, Mutex, PoisonError};

use futures::channel::oneshot;
use offline_core::{RequestKey, Response, StoredResponse};

use crate::error::{CacheError, CacheResult};
use crate::spawn::{default_spawner, DetachedTask, Spawner};
use crate::storage::{CacheHandle, CacheStorage};

/// A detached write the manager still tracks.
enum Pending {
    /// Handed to the spawner; completes by signalling.
    Running(oneshot::Receiver<()>),
    /// No executor took it; runs on the next flush.
    Deferred(DetachedTask),
}

/// Owns the identity of the current cache generation.
///
/// The version tag is fixed at construction. Reads and writes only ever
/// address that generation; every other generation in the store is stale
/// and removed by [`prune_stale_generations`](Self::prune_stale_generations).
/// Only [`ensure_current_generation`](Self::ensure_current_generation)
/// creates the generation, so a manager whose generation was pruned by a
/// newer version can neither read it nor bring it back.
///
/// Cloning is cheap and clones share the detached population tasks.
#[derive(Clone)]
pub struct GenerationManager {
    storage: Arc<dyn CacheStorage>,
    version: Arc<str>,
    spawner: Arc<dyn Spawner>,
    pending: Arc<Mutex<Vec<Pending>>>,
}

impl GenerationManager {
    /// Create a manager for generation `version` in `storage`.
    pub fn new(storage: Arc<dyn CacheStorage>, version: impl Into<String>) -> Self {
        Self {
            storage,
            version: Arc::from(version.into()),
            spawner: default_spawner(),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run detached writes on `spawner`.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// The current version tag.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Open or create the current generation.
    pub async fn ensure_current_generation(&self) -> CacheResult<Arc<dyn CacheHandle>> {
        let handle = self.storage.open(&self.version).await?;
        tracing::debug!(generation = %self.version, "current generation ready");
        Ok(handle)
    }

    /// Delete every generation except the current one.
    ///
    /// Returns the names that were removed. A generation that fails to
    /// delete is logged and skipped; failing to list generations is an error.
    pub async fn prune_stale_generations(&self) -> CacheResult<Vec<String>> {
        let names = self.storage.names().await?;
        let mut removed = Vec::new();

        for name in names.into_iter().filter(|n| *n != *self.version) {
            match self.storage.delete(&name).await {
                Ok(_) => {
                    tracing::info!(generation = %name, current = %self.version, "pruned stale generation");
                    removed.push(name);
                }
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to prune stale generation");
                }
            }
        }

        Ok(removed)
    }

    /// Look up `key` in the current generation.
    ///
    /// Misses, a missing generation, store failures and undecodable entries
    /// all come back as `None`; store trouble never reaches the request path.
    pub async fn get(&self, key: &RequestKey) -> Option<Response> {
        let stored = match self.storage.handle(&self.version).get(key).await {
            Ok(stored) => stored?,
            Err(CacheError::GenerationNotFound(_)) => {
                tracing::debug!(generation = %self.version, %key, "generation absent, treating as miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(generation = %self.version, %key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        match stored.to_response() {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(generation = %self.version, %key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Write a snapshot into the current generation, surfacing failures.
    ///
    /// Fails with [`CacheError::GenerationNotFound`] if the generation does
    /// not exist; it is never created here.
    pub async fn try_put(&self, key: &RequestKey, response: StoredResponse) -> CacheResult<()> {
        self.storage.handle(&self.version).put(key, response).await
    }

    /// Best-effort write of a live response into the current generation.
    ///
    /// Drains the body. Returns whether the entry was written; failures are
    /// logged and swallowed.
    pub async fn put(&self, key: &RequestKey, response: Response) -> bool {
        write_entry(Arc::clone(&self.storage), Arc::clone(&self.version), key, response).await
    }

    /// Write `response` in the background.
    ///
    /// The caller's response does not wait for it. The write goes to the
    /// spawner; if it declines, the write waits for [`flush`](Self::flush).
    pub fn populate_detached(&self, key: RequestKey, response: Response) {
        let storage = Arc::clone(&self.storage);
        let version = Arc::clone(&self.version);
        let (done, finished) = oneshot::channel();

        let task: DetachedTask = Box::pin(async move {
            write_entry(storage, version, &key, response).await;
            let _ = done.send(());
        });

        let entry = match self.spawner.spawn(task) {
            Ok(()) => Pending::Running(finished),
            Err(task) => Pending::Deferred(task),
        };

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain_mut(|p| match p {
            Pending::Running(finished) => matches!(finished.try_recv(), Ok(None)),
            Pending::Deferred(_) => true,
        });
        pending.push(entry);
    }

    /// Detached writes not yet known to be finished.
    pub fn pending_writes(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Finish every detached write queued so far. Returns how many were awaited.
    pub async fn flush(&self) -> usize {
        let drained: Vec<Pending> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };

        let count = drained.len();
        for entry in drained {
            match entry {
                Pending::Running(finished) => {
                    if finished.await.is_err() {
                        tracing::warn!("detached cache write dropped before finishing");
                    }
                }
                Pending::Deferred(task) => task.await,
            }
        }
        count
    }
}

async fn write_entry(
    storage: Arc<dyn CacheStorage>,
    version: Arc<str>,
    key: &RequestKey,
    response: Response,
) -> bool {
    if !key.is_cacheable() {
        tracing::debug!(%key, "skipping cache write for non-GET request");
        return false;
    }

    let stored = match StoredResponse::capture(response).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(%key, error = %e, "failed to read response for caching");
            return false;
        }
    };

    match storage.handle(&version).put(key, stored).await {
        Ok(()) => {
            tracing::debug!(generation = %version, %key, "cached response");
            true
        }
        Err(CacheError::GenerationNotFound(_)) => {
            tracing::debug!(generation = %version, %key, "generation absent, dropping cache write");
            false
        }
        Err(e) => {
            tracing::warn!(generation = %version, %key, error = %e, "cache write failed");
            false
        }
    }
}

impl std::fmt::Debug for GenerationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationManager")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvCacheStorage, MemoryKv};
    use crate::spawn::DeferToFlush;
    use offline_core::{Method, Uri};

    fn setup(version: &str) -> (Arc<MemoryKv>, GenerationManager) {
        let kv = Arc::new(MemoryKv::new());
        let storage = Arc::new(KvCacheStorage::from_shared(Arc::clone(&kv)));
        (kv, GenerationManager::new(storage, version))
    }

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&url.parse::<Uri>().unwrap())
    }

    #[tokio::test]
    async fn test_ensure_current_generation_creates_tag() {
        let (_kv, manager) = setup("lf-v1");
        let handle = manager.ensure_current_generation().await.unwrap();
        assert_eq!(handle.name(), "lf-v1");
        assert!(manager.storage().has("lf-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_miss_is_none() {
        let (_kv, manager) = setup("lf-v1");
        manager.ensure_current_generation().await.unwrap();
        assert!(manager.get(&key("https://app.example.com/")).await.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_body() {
        let (_kv, manager) = setup("lf-v1");
        manager.ensure_current_generation().await.unwrap();
        let k = key("https://app.example.com/app.css");

        assert!(manager.put(&k, Response::ok("body{}")).await);
        let cached = manager.get(&k).await.unwrap();
        assert_eq!(cached.text().await.unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_put_skips_non_get() {
        let (kv, manager) = setup("lf-v1");
        let uri: Uri = "https://app.example.com/form".parse().unwrap();
        let k = RequestKey::new(&Method::POST, &uri);

        assert!(!manager.put(&k, Response::ok("created")).await);
        assert_eq!(kv.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let (kv, manager) = setup("lf-v1");
        kv.set_unavailable(true);
        let k = key("https://app.example.com/");

        assert!(!manager.put(&k, Response::ok("x")).await);
        assert!(manager.get(&k).await.is_none());
    }

    #[tokio::test]
    async fn test_try_put_surfaces_failure() {
        let (kv, manager) = setup("lf-v1");
        kv.set_unavailable(true);
        let stored = StoredResponse {
            status: 200,
            headers: vec![],
            body: b"x".to_vec(),
        };
        assert!(manager
            .try_put(&key("https://app.example.com/"), stored)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_prune_keeps_only_current() {
        let (kv, old) = setup("lf-v1");
        old.ensure_current_generation().await.unwrap();
        let k = key("https://app.example.com/");
        assert!(old.put(&k, Response::ok("old shell")).await);
        old.storage().open("scratch").await.unwrap();

        let storage = Arc::new(KvCacheStorage::from_shared(kv));
        let current = GenerationManager::new(storage, "lf-v2");
        current.ensure_current_generation().await.unwrap();

        let mut removed = current.prune_stale_generations().await.unwrap();
        removed.sort();
        assert_eq!(removed, vec!["lf-v1", "scratch"]);
        assert_eq!(current.storage().names().await.unwrap(), vec!["lf-v2"]);

        // The old generation is gone, not just empty.
        assert!(!current.storage().has("lf-v1").await.unwrap());
        assert!(current.get(&k).await.is_none());
    }

    #[tokio::test]
    async fn test_prune_without_stale_generations() {
        let (_kv, manager) = setup("lf-v1");
        manager.ensure_current_generation().await.unwrap();
        assert!(manager.prune_stale_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_fails_when_store_unavailable() {
        let (kv, manager) = setup("lf-v1");
        kv.set_unavailable(true);
        assert!(manager.prune_stale_generations().await.is_err());
    }

    #[tokio::test]
    async fn test_detached_population_completes_on_flush() {
        let (_kv, manager) = setup("lf-v1");
        manager.ensure_current_generation().await.unwrap();
        let k = key("https://fonts.gstatic.com/s/inter.woff2");

        manager.populate_detached(k.clone(), Response::ok("font-bytes"));
        assert_eq!(manager.flush().await, 1);
        assert_eq!(manager.flush().await, 0);

        let cached = manager.get(&k).await.unwrap();
        assert_eq!(cached.bytes().await.unwrap().as_ref(), b"font-bytes");
    }

    #[tokio::test]
    async fn test_pruned_generation_stays_gone_for_old_manager() {
        let (kv, old) = setup("lf-v1");
        old.ensure_current_generation().await.unwrap();
        let k = key("https://app.example.com/index.html");
        assert!(old.put(&k, Response::ok("v1 shell")).await);

        let current = GenerationManager::new(
            Arc::new(KvCacheStorage::from_shared(Arc::clone(&kv))),
            "lf-v2",
        );
        current.ensure_current_generation().await.unwrap();
        assert_eq!(current.prune_stale_generations().await.unwrap(), vec!["lf-v1"]);

        assert!(old.get(&k).await.is_none());
        assert!(!old.put(&k, Response::ok("late write")).await);
        old.populate_detached(k.clone(), Response::ok("late detached write"));
        old.flush().await;
        assert!(matches!(
            old.try_put(&k, StoredResponse { status: 200, headers: vec![], body: vec![] }).await,
            Err(CacheError::GenerationNotFound(_))
        ));

        assert_eq!(current.storage().names().await.unwrap(), vec!["lf-v2"]);
    }

    #[tokio::test]
    async fn test_reads_and_writes_never_create_generation() {
        let (kv, manager) = setup("lf-v1");
        let k = key("https://app.example.com/");

        assert!(manager.get(&k).await.is_none());
        assert!(!manager.put(&k, Response::ok("x")).await);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_deferred_writes_wait_for_flush() {
        let (_kv, manager) = setup("lf-v1");
        let manager = manager.with_spawner(Arc::new(DeferToFlush));
        manager.ensure_current_generation().await.unwrap();
        let k = key("https://fonts.googleapis.com/css2?family=Inter");

        manager.populate_detached(k.clone(), Response::ok("@font-face{}"));
        assert_eq!(manager.pending_writes(), 1);
        assert!(manager.get(&k).await.is_none());

        assert_eq!(manager.flush().await, 1);
        assert_eq!(manager.pending_writes(), 0);
        let cached = manager.get(&k).await.unwrap();
        assert_eq!(cached.text().await.unwrap(), "@font-face{}");
    }
}
