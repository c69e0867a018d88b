//! Offline cache tier.
//!
//! Same wire shape as the session tier over a durable backend, with one
//! deliberate exception to strict expiry: while the injected connectivity
//! predicate reports offline, an expired entry is still returned. Stale but
//! present beats nothing when there is no network to refresh from.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::metrics::CacheMetrics;
use super::session::{now_millis, PersistedEntry, PersistedEntryRef};
use super::store::StorageBackend;

/// Connectivity signal supplied by the surrounding platform
pub type OnlinePredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Durable tier that serves stale entries while offline
pub struct OfflineCache<T> {
    store: Arc<dyn StorageBackend>,
    namespace: String,
    ttl: Duration,
    online: OnlinePredicate,
    metrics: Arc<CacheMetrics>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> OfflineCache<T> {
    /// Create a cache over a durable backend. `online` is the platform's
    /// connectivity signal; this tier never polls anything itself.
    pub fn new(
        store: Arc<dyn StorageBackend>,
        namespace: impl Into<String>,
        ttl: Duration,
        online: OnlinePredicate,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
            online,
            metrics: Arc::new(CacheMetrics::new()),
            _marker: PhantomData,
        }
    }

    /// A cache that assumes the client is always online
    pub fn always_online(
        store: Arc<dyn StorageBackend>,
        namespace: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self::new(store, namespace, ttl, Arc::new(|| true))
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn load(&self, key: &str) -> Option<PersistedEntry<T>> {
        let raw = self.store.get(&self.storage_key(key))?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "unreadable offline entry, dropping");
                self.metrics.record_storage_error();
                self.store.remove(&self.storage_key(key));
                None
            }
        }
    }

    /// Get a value. When online, normal expiry applies; an expired entry is
    /// a miss but is kept in storage so a later offline window can still use
    /// it. When offline, expired entries are served.
    pub fn get(&self, key: &str) -> Option<T> {
        let entry = match self.load(key) {
            Some(entry) => entry,
            None => {
                self.metrics.record_miss();
                return None;
            }
        };

        let age_ms = now_millis().saturating_sub(entry.timestamp);
        // Valid strictly under the TTL, same boundary as the memory tier.
        let fresh = age_ms < self.ttl.as_millis() as i64;

        if fresh {
            self.metrics.record_hit();
            return Some(entry.data);
        }

        if !(self.online)() {
            debug!(key, age_ms, "offline, serving expired entry");
            self.metrics.record_stale_hit();
            return Some(entry.data);
        }

        self.metrics.record_miss();
        None
    }

    /// Whether the stored entry (if any) has outlived its TTL
    pub fn is_stale(&self, key: &str) -> bool {
        match self.load(key) {
            Some(entry) => {
                now_millis().saturating_sub(entry.timestamp) >= self.ttl.as_millis() as i64
            }
            None => true,
        }
    }

    /// Store a value. Failures are logged and swallowed.
    pub fn set(&self, key: &str, value: &T) {
        let entry = PersistedEntryRef { data: value, timestamp: now_millis() };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize offline entry");
                self.metrics.record_storage_error();
                return;
            }
        };
        if let Err(e) = self.store.set(&self.storage_key(key), &raw) {
            warn!(key, error = %e, "failed to persist offline entry");
            self.metrics.record_storage_error();
            return;
        }
        self.metrics.record_put();
    }

    /// Remove a value
    pub fn remove(&self, key: &str) {
        self.store.remove(&self.storage_key(key));
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::cache::store::{FileStore, MemoryStore};

    #[test]
    fn test_fresh_entry_served_either_way() {
        let cache: OfflineCache<u32> = OfflineCache::new(
            Arc::new(MemoryStore::new()),
            "tickets",
            Duration::from_secs(60),
            Arc::new(|| false),
        );
        cache.set("mine", &3);
        assert_eq!(cache.get("mine"), Some(3));
    }

    #[test]
    fn test_entry_at_exact_ttl_boundary_is_stale() {
        let cache: OfflineCache<u32> = OfflineCache::always_online(
            Arc::new(MemoryStore::new()),
            "tickets",
            Duration::ZERO,
        );
        cache.set("k", &1);

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_stale("k"));
    }

    #[test]
    fn test_expired_entry_served_while_offline() {
        let online = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&online);

        let cache: OfflineCache<String> = OfflineCache::new(
            Arc::new(MemoryStore::new()),
            "tickets",
            Duration::from_millis(1),
            Arc::new(move || flag.load(Ordering::Relaxed)),
        );
        cache.set("mine", &"stub".to_string());

        std::thread::sleep(Duration::from_millis(10));

        // Online: expired entry is a miss.
        assert_eq!(cache.get("mine"), None);
        assert!(cache.is_stale("mine"));

        // Offline: the same expired entry is still served.
        online.store(false, Ordering::Relaxed);
        assert_eq!(cache.get("mine"), Some("stub".to_string()));
        assert_eq!(cache.metrics().snapshot().stale_hits, 1);
    }

    #[test]
    fn test_expired_entry_not_deleted_while_online() {
        let online = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&online);

        let cache: OfflineCache<u32> = OfflineCache::new(
            Arc::new(MemoryStore::new()),
            "n",
            Duration::from_millis(1),
            Arc::new(move || flag.load(Ordering::Relaxed)),
        );
        cache.set("k", &1);

        std::thread::sleep(Duration::from_millis(10));

        // Miss online, then the connection drops: the entry must still exist.
        assert_eq!(cache.get("k"), None);
        online.store(false, Ordering::Relaxed);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache: OfflineCache<u32> = OfflineCache::always_online(
                Arc::new(FileStore::new(dir.path()).unwrap()),
                "d",
                Duration::from_secs(3600),
            );
            cache.set("k", &5);
        }

        let cache: OfflineCache<u32> = OfflineCache::always_online(
            Arc::new(FileStore::new(dir.path()).unwrap()),
            "d",
            Duration::from_secs(3600),
        );
        assert_eq!(cache.get("k"), Some(5));
    }
}
