//! Dispatch configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra-field enrichment of outbound signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Distinct (entity, selector, revision) results kept.
    pub cache_capacity: usize,
    #[serde(with = "humantime_serde")]
    pub retrieve_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            retrieve_timeout: Duration::from_secs(10),
        }
    }
}

/// Diverted-response bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversionConfig {
    pub channel_capacity: usize,
}

impl Default for DiversionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}
