//! Session-scoped cache tier.
//!
//! Entries are serialized as `{data, timestamp}` JSON into an injected
//! [`StorageBackend`]. Freshness is wall-clock based so entries written by an
//! earlier page of the same session stay comparable. Storage and
//! serialization failures are logged and degrade to a miss; caching is
//! best-effort by design.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::metrics::CacheMetrics;
use super::store::StorageBackend;

/// Wire shape of a persisted entry
#[derive(Serialize, Deserialize)]
pub(crate) struct PersistedEntry<T> {
    pub data: T,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
}

/// Borrowing twin of [`PersistedEntry`] for writes
#[derive(Serialize)]
pub(crate) struct PersistedEntryRef<'a, T> {
    pub data: &'a T,
    pub timestamp: i64,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Session tier: TTL cache over an injected storage backend with an opt-in
/// stale-while-revalidate mode.
pub struct SessionCache<T> {
    store: Arc<dyn StorageBackend>,
    namespace: String,
    ttl: Duration,
    serve_stale: bool,
    metrics: Arc<CacheMetrics>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> SessionCache<T> {
    /// Create a cache writing under `namespace:` in the given backend
    pub fn new(store: Arc<dyn StorageBackend>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
            serve_stale: false,
            metrics: Arc::new(CacheMetrics::new()),
            _marker: PhantomData,
        }
    }

    /// Opt in to stale-while-revalidate: `get` returns stale data instead of
    /// missing, and the caller checks [`Self::is_stale`] to decide whether to
    /// refresh in the background.
    pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.serve_stale = enabled;
        self
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn load(&self, key: &str) -> Option<PersistedEntry<T>> {
        let raw = self.store.get(&self.storage_key(key))?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "unreadable cache entry, dropping");
                self.metrics.record_storage_error();
                self.store.remove(&self.storage_key(key));
                None
            }
        }
    }

    /// Get a value. Expired entries miss unless stale-while-revalidate is on.
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
        if age_ms < self.ttl.as_millis() as i64 {
            self.metrics.record_hit();
            return Some(entry.data);
        }

        if self.serve_stale {
            debug!(key, age_ms, "serving stale entry, caller should revalidate");
            self.metrics.record_stale_hit();
            return Some(entry.data);
        }

        self.metrics.record_expiration();
        self.metrics.record_miss();
        self.store.remove(&self.storage_key(key));
        None
    }

    /// Whether the stored entry (if any) has outlived its TTL. Lets callers
    /// trigger a refresh even when `get` returned stale data.
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
                warn!(key, error = %e, "failed to serialize cache entry");
                self.metrics.record_storage_error();
                return;
            }
        };
        if let Err(e) = self.store.set(&self.storage_key(key), &raw) {
            warn!(key, error = %e, "failed to persist cache entry");
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
    use super::*;
    use crate::cache::store::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_set_then_get() {
        let cache: SessionCache<Vec<u32>> =
            SessionCache::new(store(), "events", Duration::from_secs(60));
        cache.set("list", &vec![1, 2, 3]);
        assert_eq!(cache.get("list"), Some(vec![1, 2, 3]));
        assert!(!cache.is_stale("list"));
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache: SessionCache<String> =
            SessionCache::new(store(), "events", Duration::from_millis(1));
        cache.set("k", &"v".to_string());

        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.metrics().snapshot().expirations, 1);
    }

    #[test]
    fn test_entry_at_exact_ttl_boundary_is_stale() {
        // Zero TTL pins the age-equals-TTL case: validity is strict.
        let cache: SessionCache<u32> = SessionCache::new(store(), "events", Duration::ZERO);
        cache.set("k", &1);

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_stale("k"));
    }

    #[test]
    fn test_stale_while_revalidate_serves_stale() {
        let cache: SessionCache<String> =
            SessionCache::new(store(), "events", Duration::from_millis(1))
                .with_stale_while_revalidate(true);
        cache.set("k", &"v".to_string());

        std::thread::sleep(Duration::from_millis(10));

        // Stale data is still returned so the UI is not blocked, and
        // is_stale tells the caller to refresh.
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert!(cache.is_stale("k"));
        assert_eq!(cache.metrics().snapshot().stale_hits, 1);
    }

    #[test]
    fn test_corrupt_entry_degrades_to_miss() {
        let backing = store();
        backing.set("events:bad", "{definitely not json").unwrap();

        let cache: SessionCache<String> =
            SessionCache::new(backing.clone(), "events", Duration::from_secs(60));

        assert_eq!(cache.get("bad"), None);
        assert_eq!(cache.metrics().snapshot().storage_errors, 1);
        // The unreadable entry was dropped from storage.
        assert!(backing.get("events:bad").is_none());
    }

    #[test]
    fn test_quota_failure_is_swallowed() {
        let backing = Arc::new(MemoryStore::with_quota(4));
        let cache: SessionCache<String> =
            SessionCache::new(backing, "big", Duration::from_secs(60));

        // Entry JSON exceeds the quota; set logs and carries on.
        cache.set("k", &"a long value that cannot fit".to_string());
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.metrics().snapshot().storage_errors, 1);
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let backing = store();
        let a: SessionCache<u32> =
            SessionCache::new(backing.clone(), "a", Duration::from_secs(60));
        let b: SessionCache<u32> = SessionCache::new(backing, "b", Duration::from_secs(60));

        a.set("k", &1);
        b.set("k", &2);

        assert_eq!(a.get("k"), Some(1));
        assert_eq!(b.get("k"), Some(2));
    }

    #[test]
    fn test_remove() {
        let cache: SessionCache<u32> = SessionCache::new(store(), "n", Duration::from_secs(60));
        cache.set("k", &9);
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
    }
}
