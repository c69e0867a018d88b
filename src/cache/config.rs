//! Configuration for the cache tiers.

use std::time::Duration;

/// Tunables for the three cache tiers
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entry count for the memory tier
    pub memory_max_size: usize,

    /// Default TTL for memory tier entries
    pub memory_ttl: Duration,

    /// TTL for session tier entries
    pub session_ttl: Duration,

    /// TTL for offline tier entries (expiry is suspended while offline)
    pub offline_ttl: Duration,

    /// Whether the session tier serves stale data while the caller refreshes
    pub stale_while_revalidate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_size: 200,
            memory_ttl: Duration::from_secs(60),
            session_ttl: Duration::from_secs(300),
            offline_ttl: Duration::from_secs(3600),
            stale_while_revalidate: false,
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FETCHGUARD_MEMORY_CACHE_SIZE") {
            if let Ok(n) = val.parse() {
                config.memory_max_size = n;
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_MEMORY_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.memory_ttl = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_SESSION_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.session_ttl = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_OFFLINE_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.offline_ttl = Duration::from_secs(n);
            }
        }

        if let Ok(val) = std::env::var("FETCHGUARD_STALE_WHILE_REVALIDATE") {
            config.stale_while_revalidate = val == "1" || val.to_lowercase() == "true";
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_max_size, 200);
        assert_eq!(config.memory_ttl, Duration::from_secs(60));
        assert!(!config.stale_while_revalidate);
    }
}
