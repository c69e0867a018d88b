//! Layered caching for the resilience layer.
//!
//! Three independently addressable tiers with different durability and
//! staleness semantics; callers pick one per use case:
//!
//! ```text
//! ┌───────────────┐  process memory, bounded, strict TTL
//! │  MemoryCache  │  (also backs the request queue's short-TTL cache)
//! └───────────────┘
//! ┌───────────────┐  injected storage, survives navigation within a
//! │ SessionCache  │  session; opt-in stale-while-revalidate
//! └───────────────┘
//! ┌───────────────┐  durable storage, survives restarts; serves expired
//! │ OfflineCache  │  entries while the client is offline
//! └───────────────┘
//! ```
//!
//! Entries are never shared across tiers, and a write through one tier never
//! invalidates another; callers invalidate what they know is stale.
//!
//! Entry lifecycle: Absent → Fresh (set) → Stale (TTL elapses) → Absent
//! (eviction or explicit remove); the offline tier adds a stale-but-served
//! state available only while offline.

mod config;
mod memory;
mod metrics;
mod offline;
mod session;
mod store;

pub use config::CacheConfig;
pub use memory::MemoryCache;
pub use metrics::{CacheMetrics, CacheStats};
pub use offline::{OfflineCache, OnlinePredicate};
pub use session::SessionCache;
pub use store::{FileStore, MemoryStore, StorageBackend};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

impl CacheConfig {
    /// Build a memory tier from this config
    pub fn memory_cache<T: Clone>(&self) -> MemoryCache<T> {
        MemoryCache::new(self.memory_max_size)
    }

    /// Build a session tier over the given backend
    pub fn session_cache<T: Serialize + DeserializeOwned>(
        &self,
        store: Arc<dyn StorageBackend>,
        namespace: impl Into<String>,
    ) -> SessionCache<T> {
        SessionCache::new(store, namespace, self.session_ttl)
            .with_stale_while_revalidate(self.stale_while_revalidate)
    }

    /// Build an offline tier over the given backend and connectivity signal
    pub fn offline_cache<T: Serialize + DeserializeOwned>(
        &self,
        store: Arc<dyn StorageBackend>,
        namespace: impl Into<String>,
        online: OnlinePredicate,
    ) -> OfflineCache<T> {
        OfflineCache::new(store, namespace, self.offline_ttl, online)
    }
}
