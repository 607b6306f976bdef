//! Discovery engine configuration

use std::time::Duration;
use tracing::warn;

/// Configuration for the discovery engine
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long a cached discovery round stays servable (default: 60s)
    pub cache_ttl: Duration,
    /// Per-source fetch timeout (default: 5s)
    pub source_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            source_timeout: Duration::from_secs(5),
        }
    }
}

impl DiscoveryConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DISCOVERY_CACHE_TTL_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.cache_ttl = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring unparsable DISCOVERY_CACHE_TTL_MS: {}", val),
            }
        }

        if let Ok(val) = std::env::var("DISCOVERY_SOURCE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.source_timeout = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring unparsable DISCOVERY_SOURCE_TIMEOUT_MS: {}", val),
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
        let config = DiscoveryConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.source_timeout, Duration::from_secs(5));
    }
}
