//! Configuration for the request queue.

use std::time::Duration;

/// Tunables for one [`crate::queue::RequestQueue`] instance.
///
/// The intent is to protect a shared third-party API from bursts triggered
/// by UI re-rendering, so the right values depend on the call site: a
/// sensitive endpoint may want one request at a time with long spacing,
/// general traffic can run wider and tighter.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of operations in flight at once
    pub max_concurrent: usize,

    /// Minimum spacing between consecutive dispatches
    pub request_delay: Duration,

    /// TTL for the queue's attached response cache
    pub cache_ttl: Duration,

    /// Queue-wide dispatch pause after a 429
    pub rate_limit_backoff: Duration,

    /// Short dispatch pause after a 5xx
    pub server_error_pause: Duration,

    /// Maximum operations waiting for a slot before admission fails
    pub max_pending: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            request_delay: Duration::from_millis(100),
            cache_ttl: Duration::from_secs(60),
            rate_limit_backoff: Duration::from_secs(30),
            server_error_pause: Duration::from_secs(2),
            max_pending: 500,
        }
    }
}

impl QueueConfig {
    /// Config for especially rate-limit-sensitive endpoints: one request at
    /// a time with wide spacing
    pub fn sensitive() -> Self {
        Self {
            max_concurrent: 1,
            request_delay: Duration::from_millis(1500),
            rate_limit_backoff: Duration::from_secs(60),
            ..Default::default()
        }
    }

    /// Config for general traffic
    pub fn high_throughput() -> Self {
        Self {
            max_concurrent: 8,
            request_delay: Duration::from_millis(100),
            max_pending: 1000,
            ..Default::default()
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FETCHGUARD_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent = n;
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_REQUEST_DELAY_MS") {
            if let Ok(n) = val.parse() {
                config.request_delay = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_CACHE_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.cache_ttl = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_RATE_LIMIT_BACKOFF_SECS") {
            if let Ok(n) = val.parse() {
                config.rate_limit_backoff = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_SERVER_ERROR_PAUSE_MS") {
            if let Ok(n) = val.parse() {
                config.server_error_pause = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_MAX_PENDING") {
            if let Ok(n) = val.parse() {
                config.max_pending = n;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.request_delay, Duration::from_millis(100));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_sensitive_preset() {
        let config = QueueConfig::sensitive();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.request_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_env_overrides_server_error_pause() {
        std::env::set_var("FETCHGUARD_SERVER_ERROR_PAUSE_MS", "750");
        let config = QueueConfig::from_env();
        std::env::remove_var("FETCHGUARD_SERVER_ERROR_PAUSE_MS");

        assert_eq!(config.server_error_pause, Duration::from_millis(750));
    }

    #[test]
    fn test_high_throughput_preset() {
        let config = QueueConfig::high_throughput();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.max_pending, 1000);
    }
}
