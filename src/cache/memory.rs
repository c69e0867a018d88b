//! In-process bounded TTL cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use xxhash_rust::xxh3::xxh3_64;

use super::metrics::CacheMetrics;

/// A cached value with creation and expiry timestamps
struct StoredEntry<T> {
    data: T,
    created_at: Instant,
    expires_at: Instant,
}

impl<T> StoredEntry<T> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded in-memory cache with per-entry TTL.
///
/// Keys are strings hashed with xxh3 for O(1) lookup. Expired entries are
/// removed on read (never returned as fresh) and preferred for eviction when
/// the cache overflows; after that the oldest-created entries go, until at
/// least 20% of capacity is free.
pub struct MemoryCache<T> {
    entries: HashMap<u64, StoredEntry<T>>,
    max_size: usize,
    metrics: Arc<CacheMetrics>,
}

impl<T: Clone> MemoryCache<T> {
    /// Create a cache holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_size.max(1)),
            max_size: max_size.max(1),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    fn key_hash(key: &str) -> u64 {
        xxh3_64(key.as_bytes())
    }

    /// Get a fresh value. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let hash = Self::key_hash(key);

        match self.entries.get(&hash) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(&hash);
                self.metrics.record_expiration();
                self.metrics.record_miss();
                None
            }
            Some(entry) => {
                self.metrics.record_hit();
                Some(entry.data.clone())
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Whether a fresh value exists. Removes the entry on expiry, like `get`.
    pub fn has(&mut self, key: &str) -> bool {
        let hash = Self::key_hash(key);
        match self.entries.get(&hash) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(&hash);
                self.metrics.record_expiration();
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Store a value with the given TTL, evicting on overflow
    pub fn set(&mut self, key: &str, value: T, ttl: Duration) {
        let hash = Self::key_hash(key);

        if !self.entries.contains_key(&hash) && self.entries.len() >= self.max_size {
            self.evict();
        }

        let now = Instant::now();
        self.entries.insert(
            hash,
            StoredEntry { data: value, created_at: now, expires_at: now + ttl },
        );
        self.metrics.record_put();
    }

    /// Remove one entry
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(&Self::key_hash(key)).is_some()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current entry count (expired entries included until touched or evicted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Free at least 20% of capacity: expired entries first, then the
    /// oldest-created.
    fn evict(&mut self) {
        let target_free = (self.max_size / 5).max(1);

        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(hash, _)| *hash)
            .collect();
        for hash in expired {
            self.entries.remove(&hash);
            self.metrics.record_eviction();
        }

        while self.max_size - self.entries.len() < target_free {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(hash, _)| *hash);
            match oldest {
                Some(hash) => {
                    self.entries.remove(&hash);
                    self.metrics.record_eviction();
                }
                None => break,
            }
        }
    }
}
