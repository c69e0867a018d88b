//! Metrics for the request queue.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by one queue instance
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Operations admitted (cache misses that went to the pending list)
    pub enqueued: AtomicU64,
    /// Operations whose underlying function actually ran
    pub dispatched: AtomicU64,
    /// Enqueues answered from the attached cache
    pub cache_hits: AtomicU64,
    /// Enqueues that missed the attached cache
    pub cache_misses: AtomicU64,
    /// Operations completing successfully
    pub completed: AtomicU64,
    /// Operations completing with an error
    pub failed: AtomicU64,
    /// 429 failures that opened a backoff window
    pub rate_limited: AtomicU64,
    /// 5xx failures that opened a pause window
    pub server_errors: AtomicU64,
    /// Admissions rejected because the pending list was full
    pub rejected: AtomicU64,
    /// Currently running operations (gauge)
    pub in_flight: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_error(&self) {
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Currently running operations
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> QueueStats {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;

        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            cache_hit_rate: if lookups > 0 {
                cache_hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.dispatched.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.server_errors.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dispatched: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub completed: u64,
    pub failed: u64,
    pub rate_limited: u64,
    pub server_errors: u64,
    pub rejected: u64,
    pub in_flight: u64,
    pub cache_hit_rate: f64,
}
