//! Metrics for the cache tiers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by a cache tier instance
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Fresh hits
    pub hits: AtomicU64,
    /// Misses (absent or expired)
    pub misses: AtomicU64,
    /// Stale entries served (stale-while-revalidate or offline)
    pub stale_hits: AtomicU64,
    /// Stores
    pub puts: AtomicU64,
    /// Entries removed by capacity eviction
    pub evictions: AtomicU64,
    /// Entries removed on expiry detection
    pub expirations: AtomicU64,
    /// Storage read/write failures recovered as misses
    pub storage_errors: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let stale_hits = self.stale_hits.load(Ordering::Relaxed);
        let lookups = hits + misses + stale_hits;

        CacheStats {
            hits,
            misses,
            stale_hits,
            puts: self.puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            hit_rate: if lookups > 0 {
                (hits + stale_hits) as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.stale_hits.store(0, Ordering::Relaxed);
        self.puts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.storage_errors.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub puts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub storage_errors: u64,
    /// Fraction of lookups answered from cache (fresh or stale)
    pub hit_rate: f64,
}
