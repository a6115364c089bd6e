//! Synchronization tunables.
//!
//! All intervals are stored as whole seconds so the config round-trips
//! cleanly through TOML/JSON; `Duration` accessors are provided for the
//! components that consume them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for the synchronization layer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Minimum interval between two completed session checks.
    #[serde(default = "default_check_throttle_secs")]
    pub check_throttle_secs: u64,
    /// Safety timeout after which a stuck loading flag may be cleared on a
    /// visibility change. Does not cancel the underlying request.
    #[serde(default = "default_stuck_loading_timeout_secs")]
    pub stuck_loading_timeout_secs: u64,
    /// Fallback poll interval for the unread-count badge.
    #[serde(default = "default_count_poll_interval_secs")]
    pub count_poll_interval_secs: u64,
}

fn default_check_throttle_secs() -> u64 {
    10
}

fn default_stuck_loading_timeout_secs() -> u64 {
    8
}

fn default_count_poll_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_throttle_secs: default_check_throttle_secs(),
            stuck_loading_timeout_secs: default_stuck_loading_timeout_secs(),
            count_poll_interval_secs: default_count_poll_interval_secs(),
        }
    }
}

impl SyncConfig {
    pub fn check_throttle(&self) -> Duration {
        Duration::from_secs(self.check_throttle_secs)
    }

    pub fn stuck_loading_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_loading_timeout_secs)
    }

    pub fn count_poll_interval(&self) -> Duration {
        Duration::from_secs(self.count_poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.check_throttle(), Duration::from_secs(10));
        assert_eq!(config.stuck_loading_timeout(), Duration::from_secs(8));
        assert_eq!(config.count_poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: SyncConfig = toml::from_str("check_throttle_secs = 20").unwrap();
        assert_eq!(config.check_throttle_secs, 20);
        assert_eq!(config.stuck_loading_timeout_secs, 8);
        assert_eq!(config.count_poll_interval_secs, 30);
    }
}
