//! # Reconciler Configuration
//!
//! Requeue intervals, error backoff bounds and the watched namespace.

use super::env_var_or_default;
use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_LONG_WAIT_SECS,
    DEFAULT_SHORT_WAIT_SECS,
};
use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requeue delay while a server is being created or deleted (seconds)
    pub short_wait_secs: u64,
    /// Requeue delay once a server is in its steady state (seconds)
    pub long_wait_secs: u64,
    /// First error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Error backoff cap (seconds)
    pub backoff_max_secs: u64,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            short_wait_secs: DEFAULT_SHORT_WAIT_SECS,
            long_wait_secs: DEFAULT_LONG_WAIT_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let backoff_min_secs = env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS);
        Self {
            short_wait_secs: env_var_or_default("SHORT_WAIT_SECS", DEFAULT_SHORT_WAIT_SECS),
            long_wait_secs: env_var_or_default("LONG_WAIT_SECS", DEFAULT_LONG_WAIT_SECS),
            backoff_min_secs,
            // A cap below the minimum would make the backoff shrink
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)
                .max(backoff_min_secs),
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
        }
    }

    pub fn short_wait(&self) -> Duration {
        Duration::from_secs(self.short_wait_secs)
    }

    pub fn long_wait(&self) -> Duration {
        Duration::from_secs(self.long_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.short_wait(), Duration::from_secs(30));
        assert_eq!(config.long_wait(), Duration::from_secs(60));
        assert_eq!(config.backoff_min_secs, 60);
        assert_eq!(config.backoff_max_secs, 600);
        assert!(config.watch_namespace.is_none());
    }
}
