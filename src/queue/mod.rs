//! Request queue with concurrency control, pacing and punitive backoff.
//!
//! One queue instance guards one upstream. Callers submit asynchronous
//! operations; the queue answers repeated cache-keyed reads from its attached
//! short-TTL cache, bounds how many operations run at once, enforces minimum
//! spacing between dispatches, and pauses all dispatch after a rate limit or
//! server error.
//!
//! ```text
//! enqueue(op, cache_key)
//!        │
//!        ▼
//! ┌──────────────┐ hit
//! │ MemoryCache  │──────▶ cached value
//! └──────┬───────┘
//!        │ miss
//!        ▼
//! ┌──────────────┐   ordered by (priority, seq):
//! │ pending list │   reads ahead of writes
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐   rate_limited_until ▸ pause_until ▸ request_delay
//! │    pacing    │
//! └──────┬───────┘
//!        ▼
//!      op().await
//! ```
//!
//! Pending order is not strictly FIFO: cache-keyed reads jump ahead of
//! uncacheable writes submitted earlier so reads are not starved. Two callers
//! racing on the same cold cache key may both dispatch; the cache is a
//! performance optimization, not a correctness mechanism, so that window is
//! accepted rather than locked away.
//!
//! `enqueue` is cancel-safe: an admitted operation holds its place through an
//! RAII guard, so a caller that stops awaiting (timeout, select, dropped
//! task) gives its pending slot back, and an abandoned in-flight operation
//! frees its concurrency slot. Scheduling state lives behind a synchronous
//! mutex held only for short non-awaiting sections, which is what lets the
//! guard clean up from `Drop`.

mod config;
mod metrics;

pub use config::QueueConfig;
pub use metrics::{QueueMetrics, QueueStats};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::MemoryCache;
use crate::error::FetchError;
use crate::retry::RetryPolicy;

/// How often a parked operation re-checks for its turn
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Entry count for the queue's attached response cache
const RESPONSE_CACHE_SIZE: usize = 256;

const PRIORITY_READ: u8 = 0;
const PRIORITY_WRITE: u8 = 1;

/// Position of one admitted operation: lower sorts earlier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Ticket {
    priority: u8,
    seq: u64,
}

/// Holds an admitted operation's place in the queue.
///
/// Dropped without completing (the caller stopped awaiting), it removes its
/// ticket from the pending list, or frees the concurrency slot if the
/// operation had already been dispatched. Every slot is therefore returned
/// exactly once, on the normal path and on cancellation alike.
struct TicketGuard<'a, T: Clone> {
    queue: &'a RequestQueue<T>,
    ticket: Ticket,
    /// Set once `wait_for_turn` has claimed a concurrency slot
    dispatched: bool,
}

impl<T: Clone> Drop for TicketGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.queue.lock_state();
        if self.dispatched {
            state.active = state.active.saturating_sub(1);
        } else if let Some(pos) = state.pending.iter().position(|t| *t == self.ticket) {
            state.pending.remove(pos);
        }
    }
}

struct QueueState {
    active: usize,
    /// Sorted ascending by (priority, seq)
    pending: Vec<Ticket>,
    last_request_at: Option<Instant>,
    rate_limited_until: Option<Instant>,
    pause_until: Option<Instant>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            active: 0,
            pending: Vec::new(),
            last_request_at: None,
            rate_limited_until: None,
            pause_until: None,
        }
    }
}

/// Request queue bounding and pacing outbound operations.
///
/// Explicitly constructed and dependency-injected; create one instance per
/// upstream instead of sharing hidden global state, and call [`Self::reset`]
/// in test teardown.
pub struct RequestQueue<T: Clone> {
    config: QueueConfig,
    /// Scheduling state; held only for short non-awaiting sections
    state: Mutex<QueueState>,
    cache: AsyncMutex<MemoryCache<T>>,
    metrics: Arc<QueueMetrics>,
    seq: AtomicU64,
}

impl<T: Clone> RequestQueue<T> {
    /// Create a queue with the given configuration
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::new()),
            cache: AsyncMutex::new(MemoryCache::new(RESPONSE_CACHE_SIZE)),
            metrics: Arc::new(QueueMetrics::new()),
            seq: AtomicU64::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit one operation.
    ///
    /// A present, fresh `cache_key` short-circuits without dispatching. On a
    /// miss the operation waits for a slot (reads ahead of writes), then for
    /// any backoff window and the minimum inter-request spacing, then runs.
    /// A successful keyed result is stored under the queue TTL. Errors
    /// propagate to the caller after updating the backoff windows; no
    /// operation is ever silently dropped.
    pub async fn enqueue<F, Fut>(&self, op: F, cache_key: Option<&str>) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(key) = cache_key {
            if let Some(value) = self.cache.lock().await.get(key) {
                self.metrics.record_cache_hit();
                debug!(key, "answered from queue cache");
                return Ok(value);
            }
            self.metrics.record_cache_miss();
        }

        let mut guard = self.admit(cache_key.is_some())?;
        self.metrics.record_enqueued();

        self.wait_for_turn(&mut guard).await;
        self.pace().await;

        self.metrics.record_dispatched();
        let result = op().await;
        self.release(&result);
        drop(guard);

        match result {
            Ok(value) => {
                if let Some(key) = cache_key {
                    self.cache
                        .lock()
                        .await
                        .set(key, value.clone(), self.config.cache_ttl);
                }
                self.metrics.record_completed();
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_failed();
                Err(e)
            }
        }
    }

    /// Submit one operation with a retry policy.
    ///
    /// Each attempt is re-enqueued, so retries pass admission, pacing and the
    /// backoff windows like any other operation instead of bypassing the
    /// concurrency bound. Only transient errors are retried.
    pub async fn enqueue_with_retry<F, Fut>(
        &self,
        op: F,
        cache_key: Option<&str>,
        policy: &RetryPolicy,
    ) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match self.enqueue(&op, cache_key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= policy.retries || !e.is_retryable() {
                        return Err(e);
                    }
                    let delay = policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = policy.retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, backing off before re-enqueue"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Reserve a place in the pending list
    fn admit(&self, is_read: bool) -> Result<TicketGuard<'_, T>, FetchError> {
        let mut state = self.lock_state();

        if state.pending.len() >= self.config.max_pending {
            self.metrics.record_rejected();
            return Err(FetchError::QueueFull { max: self.config.max_pending });
        }

        let ticket = Ticket {
            priority: if is_read { PRIORITY_READ } else { PRIORITY_WRITE },
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let pos = state.pending.partition_point(|t| *t <= ticket);
        state.pending.insert(pos, ticket);
        Ok(TicketGuard { queue: self, ticket, dispatched: false })
    }

    /// Park until this ticket is at the head and a slot is free
    async fn wait_for_turn(&self, guard: &mut TicketGuard<'_, T>) {
        loop {
            {
                let mut state = self.lock_state();
                if state.active < self.config.max_concurrent
                    && state.pending.first() == Some(&guard.ticket)
                {
                    state.pending.remove(0);
                    state.active += 1;
                    guard.dispatched = true;
                    return;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait out any backoff window, then the minimum inter-request spacing.
    /// The spacing slot is claimed inside the lock so concurrent dispatchers
    /// line up instead of departing together.
    async fn pace(&self) {
        loop {
            let wait = {
                let mut state = self.lock_state();
                let now = Instant::now();

                if let Some(until) = state.rate_limited_until.filter(|u| *u > now) {
                    until - now
                } else if let Some(until) = state.pause_until.filter(|u| *u > now) {
                    until - now
                } else {
                    match state.last_request_at {
                        Some(last) if now.duration_since(last) < self.config.request_delay => {
                            self.config.request_delay - now.duration_since(last)
                        }
                        _ => {
                            state.last_request_at = Some(now);
                            Duration::ZERO
                        }
                    }
                }
            };

            if wait.is_zero() {
                return;
            }
            debug!(wait_ms = wait.as_millis() as u64, "dispatch delayed");
            tokio::time::sleep(wait).await;
        }
    }

    /// Convert failures into scheduling state. The concurrency slot itself
    /// is returned by the [`TicketGuard`].
    fn release(&self, result: &Result<T, FetchError>) {
        if let Err(e) = result {
            let mut state = self.lock_state();
            let now = Instant::now();
            match e {
                FetchError::RateLimited { .. } => {
                    state.rate_limited_until = Some(now + self.config.rate_limit_backoff);
                    self.metrics.record_rate_limited();
                    warn!(
                        backoff_ms = self.config.rate_limit_backoff.as_millis() as u64,
                        "rate limited, pausing all dispatch"
                    );
                }
                FetchError::ServerError { status, .. } => {
                    state.pause_until = Some(now + self.config.server_error_pause);
                    self.metrics.record_server_error();
                    warn!(status, "server error, short dispatch pause");
                }
                _ => {}
            }
        }
    }

    /// Drop one cached entry
    pub async fn invalidate(&self, key: &str) {
        self.cache.lock().await.remove(key);
    }

    /// Operations currently waiting for a slot
    pub fn pending(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Operations currently running
    pub fn in_flight(&self) -> usize {
        self.lock_state().active
    }

    /// Snapshot of queue counters
    pub fn stats(&self) -> QueueStats {
        self.metrics.snapshot()
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<QueueMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The queue's configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Clear scheduling state, the attached cache and all counters.
    /// For test teardown; not expected to run while operations are in flight.
    pub async fn reset(&self) {
        *self.lock_state() = QueueState::new();
        self.cache.lock().await.clear();
        self.metrics.reset();
    }
}
