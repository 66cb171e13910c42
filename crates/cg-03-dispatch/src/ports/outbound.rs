//! Outbound Ports (Driven Ports)
//!
//! Collaborators the dispatch stages depend on. Transport adapters and the
//! command-routing layer implement these.

use crate::error::{EnrichmentError, PublishError};
use async_trait::async_trait;
use shared_types::{AuthorizationContext, EntityId, ExternalMessage, FieldSelector, Signal};

/// Canonical internal dispatch point for admitted signals.
///
/// Fire-and-forget: responses come back asynchronously carrying the same
/// correlation id.
#[async_trait]
pub trait CommandRouter: Send + Sync {
    async fn forward(&self, signal: Signal);
}

/// Read access to entities, used to fetch extra fields for outbound signals.
#[async_trait]
pub trait EnrichmentFacade: Send + Sync {
    /// Retrieve the `selector` fields of `entity_id` as `auth_context`.
    ///
    /// Returns the query response signal; its payload holds the fields.
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth_context: &AuthorizationContext,
    ) -> Result<Signal, EnrichmentError>;
}

/// Where a publish goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Target `index` of the connection.
    Target { index: usize, address: String },
    /// Reply target of source `source_index`.
    Reply { source_index: usize, address: String },
}

impl Destination {
    pub fn address(&self) -> &str {
        match self {
            Destination::Target { address, .. } | Destination::Reply { address, .. } => address,
        }
    }
}

/// Transport-specific outbound send.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        message: ExternalMessage,
        destination: &Destination,
    ) -> Result<(), PublishError>;
}
