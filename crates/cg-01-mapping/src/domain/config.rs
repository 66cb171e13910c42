//! Mapping configuration.

use serde::{Deserialize, Serialize};

/// `mapping` section of the gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Number of mapping workers per connection.
    pub parallelism: usize,
    /// Bounded queue in front of the workers.
    pub queue_capacity: usize,
    /// Max signals one mapper may produce from one external message.
    pub max_mapped_inbound_messages: usize,
    /// Max external messages one mapper may produce from one signal.
    pub max_mapped_outbound_messages: usize,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            queue_capacity: 1024,
            max_mapped_inbound_messages: 10,
            max_mapped_outbound_messages: 10,
        }
    }
}
