//! Acknowledgement configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts of response collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcknowledgementsConfig {
    /// Used when a message carries no `timeout` header.
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Requested timeouts above this are clamped.
    #[serde(with = "humantime_serde")]
    pub max_timeout: Duration,
    /// How often expired collectors are swept.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for AcknowledgementsConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(60),
            max_timeout: Duration::from_secs(120),
            cleanup_interval: Duration::from_millis(100),
        }
    }
}

impl AcknowledgementsConfig {
    /// Timeout to apply for a requested one.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_timeout)
            .min(self.max_timeout)
    }
}
