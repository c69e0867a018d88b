//! Fetchguard
//!
//! Client-side request resilience for applications talking to a shared
//! backend API: queued and throttled dispatch, bounded retry with backoff,
//! read-once response guarding, and layered caching.
//!
//! # Architecture
//!
//! ```text
//! feature code
//!      │
//!      ▼
//! RetryPolicy ──────── bounded exponential backoff with jitter
//!      │
//!      ▼
//! RequestQueue ─────── concurrency bound, inter-request spacing,
//!      │               queue-wide 429/5xx backoff, short-TTL cache
//!      ▼
//! HttpClient → guard() ─ body read exactly once, replayable SafeResponse
//!
//! MemoryCache / SessionCache / OfflineCache ─ orthogonal tiers feature
//!                                             code uses to skip the network
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fetchguard::{guard, HttpClient, QueueConfig, RequestQueue, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchguard::FetchError> {
//!     let client = HttpClient::new("https://api.example.com");
//!     let queue: RequestQueue<serde_json::Value> =
//!         RequestQueue::new(QueueConfig::default());
//!
//!     let events = queue
//!         .enqueue_with_retry(
//!             || async {
//!                 let response = client.get("/events").await?;
//!                 let safe = guard(response).await?;
//!                 Ok(safe.json())
//!             },
//!             Some("events:list"),
//!             &RetryPolicy::default(),
//!         )
//!         .await?;
//!
//!     println!("{events}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod queue;
pub mod response;
pub mod retry;

pub use cache::{
    CacheConfig, CacheMetrics, CacheStats, FileStore, MemoryCache, MemoryStore, OfflineCache,
    OnlinePredicate, SessionCache, StorageBackend,
};
pub use client::{ClientResponse, HttpClient};
pub use error::{FetchError, StorageError};
pub use queue::{QueueConfig, QueueMetrics, QueueStats, RequestQueue};
pub use response::{guard, HttpResponse, ResponseRecord, SafeResponse};
pub use retry::RetryPolicy;
