//! # Diverted Responses
//!
//! The value carried by the bus and the per-connection filter.

use shared_types::{ConnectionId, EntityId, Signal};

/// A response diverted from one connection to another.
#[derive(Debug, Clone, PartialEq)]
pub struct DivertedResponse {
    /// The response, already stamped with `diverted-response-from-connection`.
    pub signal: Signal,
    /// Connection that should receive the response.
    pub target_connection: ConnectionId,
    /// Entity the response is about.
    pub entity_id: EntityId,
    /// Entity group, e.g. `things`.
    pub group: String,
}

impl DivertedResponse {
    /// Connection the response was diverted from, if stamped.
    pub fn source_connection(&self) -> Option<&str> {
        self.signal
            .headers()
            .get(shared_types::keys::DIVERTED_RESPONSE_FROM_CONNECTION)
    }
}

/// Filter selecting diverted responses for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiversionFilter {
    /// Only responses addressed to this connection pass.
    pub connection_id: ConnectionId,
}

impl DiversionFilter {
    #[must_use]
    pub fn for_connection(connection_id: ConnectionId) -> Self {
        Self { connection_id }
    }

    #[must_use]
    pub fn matches(&self, response: &DivertedResponse) -> bool {
        response.target_connection == self.connection_id
    }
}
