//! Response cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_ENTRY_LIMIT: usize = 500;
const DEFAULT_EXPIRATION_SECS: u64 = 300;
const DEFAULT_REVALIDATION_SECS: u64 = 60;

/// Cache configuration from `pressroom.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enabled: bool,
    /// Maximum number of cached responses and response parts.
    pub entry_limit: usize,
    /// Default freshness lifetime (seconds) for handlers without an opinion.
    pub default_expiration_secs: u64,
    /// Default revalidation grace (seconds) for stale entries.
    pub default_revalidation_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entry_limit: DEFAULT_ENTRY_LIMIT,
            default_expiration_secs: DEFAULT_EXPIRATION_SECS,
            default_revalidation_secs: DEFAULT_REVALIDATION_SECS,
        }
    }
}

impl CacheConfig {
    pub fn entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.entry_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn default_expiration(&self) -> Duration {
        Duration::from_secs(self.default_expiration_secs)
    }

    pub fn default_revalidation(&self) -> Duration {
        Duration::from_secs(self.default_revalidation_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.entry_limit, 500);
        assert_eq!(config.default_expiration(), Duration::from_secs(300));
        assert_eq!(config.default_revalidation(), Duration::from_secs(60));
    }

    #[test]
    fn entry_limit_clamps_to_min() {
        let config = CacheConfig {
            entry_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.entry_limit_non_zero().get(), 1);
    }
}
