//! Cache generations laid out over a flat key-value byte store.
//!
//! Every generation owns the keys prefixed with its name and a unit
//! separator. The bare prefix is a marker written on `open`, so empty
//! generations still show up in `names()`. Only `open` writes the marker;
//! handles refuse to touch a generation whose marker is gone.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use offline_core::{RequestKey, StoredResponse};

use crate::error::{CacheError, CacheResult};
use crate::storage::{CacheHandle, CacheStorage};

const SEPARATOR: char = '\u{1f}';

/// Flat key-value byte store.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Get a value. Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value.
    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    /// Delete a value.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// All keys in the store.
    async fn keys(&self) -> CacheResult<Vec<String>>;
}

/// [`CacheStorage`] backed by any [`KvBackend`].
pub struct KvCacheStorage<B: KvBackend> {
    backend: Arc<B>,
}

impl<B: KvBackend + 'static> KvCacheStorage<B> {
    /// Create a storage over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Create a storage sharing an existing backend.
    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    async fn generation_keys(&self, name: &str) -> CacheResult<Vec<String>> {
        let prefix = marker_key(name);
        let keys = self.backend.keys().await?;
        Ok(keys.into_iter().filter(|k| k.starts_with(&prefix)).collect())
    }
}

#[async_trait]
impl<B: KvBackend + 'static> CacheStorage for KvCacheStorage<B> {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheHandle>> {
        let marker = marker_key(name);
        if self.backend.get(&marker).await?.is_none() {
            self.backend.set(&marker, &[]).await?;
        }

        Ok(self.handle(name))
    }

    fn handle(&self, name: &str) -> Arc<dyn CacheHandle> {
        Arc::new(KvCacheHandle {
            backend: Arc::clone(&self.backend),
            name: name.to_string(),
        })
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.backend.get(&marker_key(name)).await?.is_some())
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .backend
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.split_once(SEPARATOR).map(|(name, _)| name.to_string()))
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let marker = marker_key(name);
        let keys = self.generation_keys(name).await?;
        if keys.is_empty() {
            return Ok(false);
        }

        // Entries first; the marker goes last so a partial delete stays visible.
        for key in keys.iter().filter(|k| **k != marker) {
            self.backend.delete(key).await?;
        }
        self.backend.delete(&marker).await?;
        Ok(true)
    }
}

/// Open generation inside a [`KvCacheStorage`].
struct KvCacheHandle<B: KvBackend> {
    backend: Arc<B>,
    name: String,
}

impl<B: KvBackend> KvCacheHandle<B> {
    async fn ensure_live(&self) -> CacheResult<()> {
        if self.backend.get(&marker_key(&self.name)).await?.is_none() {
            return Err(CacheError::GenerationNotFound(self.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl<B: KvBackend + 'static> CacheHandle for KvCacheHandle<B> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> CacheResult<Option<StoredResponse>> {
        self.ensure_live().await?;
        match self.backend.get(&entry_key(&self.name, key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> CacheResult<()> {
        self.ensure_live().await?;
        let bytes = serde_json::to_vec(&response)?;
        self.backend.set(&entry_key(&self.name, key), &bytes).await
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.ensure_live().await?;
        let prefix = marker_key(&self.name);
        Ok(self
            .backend
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .filter(|k| !k.is_empty())
            .collect())
    }
}

fn marker_key(name: &str) -> String {
    format!("{}{}", name, SEPARATOR)
}

fn entry_key(name: &str, key: &RequestKey) -> String {
    format!("{}{}{}", name, SEPARATOR, key.as_str())
}

/// Counters for backend calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KvStats {
    /// `get` calls.
    pub reads: u64,
    /// `set` calls.
    pub writes: u64,
    /// `delete` calls.
    pub deletes: u64,
    /// `keys` calls.
    pub scans: u64,
}

/// In-memory backend (for host builds and testing).
///
/// Counts every call and can be switched into an unavailable state where
/// every operation fails.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryKv {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> KvStats {
        KvStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
            scans: self.scans.load(Ordering::SeqCst),
        }
    }

    /// Number of raw keys held (markers included).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the backend holds no keys.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.lock().remove(key);
        Ok(())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.lock().keys().cloned().collect())
    }
}

/// Backend over Spin's Key-Value Store.
#[cfg(target_arch = "wasm32")]
pub struct SpinKv {
    store: spin_sdk::key_value::Store,
}

#[cfg(target_arch = "wasm32")]
impl SpinKv {
    /// Open the default Key-Value store.
    pub fn open_default() -> CacheResult<Self> {
        let store = spin_sdk::key_value::Store::open_default()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { store })
    }

    /// Open a named Key-Value store.
    pub fn open(label: &str) -> CacheResult<Self> {
        let store = spin_sdk::key_value::Store::open(label)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { store })
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait]
impl KvBackend for SpinKv {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.store
            .get(key)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        self.store
            .set(key, value)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store
            .delete(key)
            .map_err(|e| CacheError::Storage(e.to_string()))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.store
            .get_keys()
            .map_err(|e| CacheError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::{StoredHeader, Uri};

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&url.parse::<Uri>().unwrap())
    }

    fn stored(body: &str) -> StoredResponse {
        StoredResponse {
            status: 200,
            headers: vec![StoredHeader::new("content-type", "text/html")],
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_empty_generation() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        assert!(!storage.has("lf-v1").await.unwrap());

        let handle = storage.open("lf-v1").await.unwrap();
        assert_eq!(handle.name(), "lf-v1");
        assert!(storage.has("lf-v1").await.unwrap());
        assert_eq!(storage.names().await.unwrap(), vec!["lf-v1"]);
        assert!(handle.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        storage.open("lf-v1").await.unwrap();
        storage.open("lf-v1").await.unwrap();
        assert_eq!(storage.names().await.unwrap().len(), 1);
        assert_eq!(storage.backend().len(), 1);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let handle = storage.open("lf-v1").await.unwrap();
        let k = key("https://app.example.com/index.html");

        assert!(handle.get(&k).await.unwrap().is_none());
        handle.put(&k, stored("<html>")).await.unwrap();
        assert_eq!(handle.get(&k).await.unwrap(), Some(stored("<html>")));
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let handle = storage.open("lf-v1").await.unwrap();
        let k = key("https://app.example.com/");

        handle.put(&k, stored("old")).await.unwrap();
        handle.put(&k, stored("new")).await.unwrap();

        assert_eq!(handle.keys().await.unwrap().len(), 1);
        assert_eq!(handle.get(&k).await.unwrap(), Some(stored("new")));
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let v1 = storage.open("lf-v1").await.unwrap();
        let v2 = storage.open("lf-v2").await.unwrap();
        let k = key("https://app.example.com/");

        v1.put(&k, stored("v1")).await.unwrap();
        assert!(v2.get(&k).await.unwrap().is_none());
        assert_eq!(storage.names().await.unwrap(), vec!["lf-v1", "lf-v2"]);
    }

    #[tokio::test]
    async fn test_delete_removes_generation_and_entries() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let v1 = storage.open("lf-v1").await.unwrap();
        v1.put(&key("https://app.example.com/"), stored("a"))
            .await
            .unwrap();
        v1.put(&key("https://app.example.com/index.html"), stored("b"))
            .await
            .unwrap();

        assert!(storage.delete("lf-v1").await.unwrap());
        assert!(!storage.has("lf-v1").await.unwrap());
        assert!(storage.backend().is_empty());
        assert!(!storage.delete("lf-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_of_deleted_generation_cannot_read() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let v1 = storage.open("lf-v1").await.unwrap();
        let k = key("https://app.example.com/");
        v1.put(&k, stored("a")).await.unwrap();

        storage.delete("lf-v1").await.unwrap();

        assert!(matches!(
            v1.get(&k).await,
            Err(CacheError::GenerationNotFound(name)) if name == "lf-v1"
        ));
    }

    #[tokio::test]
    async fn test_handle_does_not_create_generation() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let handle = storage.handle("lf-v1");
        let k = key("https://app.example.com/");

        assert!(matches!(
            handle.put(&k, stored("a")).await,
            Err(CacheError::GenerationNotFound(_))
        ));
        assert!(matches!(
            handle.get(&k).await,
            Err(CacheError::GenerationNotFound(_))
        ));
        assert!(storage.names().await.unwrap().is_empty());
        assert!(storage.backend().is_empty());
    }

    #[tokio::test]
    async fn test_handle_sees_opened_generation() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        let k = key("https://app.example.com/");
        storage.open("lf-v1").await.unwrap().put(&k, stored("a")).await.unwrap();

        let handle = storage.handle("lf-v1");
        assert_eq!(handle.get(&k).await.unwrap(), Some(stored("a")));
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails() {
        let storage = KvCacheStorage::new(MemoryKv::new());
        storage.backend().set_unavailable(true);
        assert!(matches!(
            storage.open("lf-v1").await,
            Err(CacheError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_count_calls() {
        let kv = MemoryKv::new();
        kv.set("a", b"1").await.unwrap();
        kv.get("a").await.unwrap();
        kv.get("b").await.unwrap();
        kv.keys().await.unwrap();
        kv.delete("a").await.unwrap();

        assert_eq!(
            kv.stats(),
            KvStats {
                reads: 2,
                writes: 1,
                deletes: 1,
                scans: 1,
            }
        );
    }
}
