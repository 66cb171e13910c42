//! # Response Diversion
//!
//! Redirects command responses to another connection when the command asked
//! for it via `divert-response-to-connection`.

use crate::domain::diversion_target;
use crate::metrics::DispatchMetrics;
use shared_bus::DiversionPublisher;
use shared_types::{keys, ConnectionId, Signal, THINGS_GROUP};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ResponseDiversionInterceptor {
    connection_id: ConnectionId,
    bus: Arc<dyn DiversionPublisher>,
    metrics: Arc<DispatchMetrics>,
}

impl ResponseDiversionInterceptor {
    pub fn new(
        connection_id: ConnectionId,
        bus: Arc<dyn DiversionPublisher>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            connection_id,
            bus,
            metrics,
        }
    }

    /// Divert `response` if its headers ask for it.
    ///
    /// Returns `true` when the response was handed to the bus; the caller
    /// must then not deliver it through its own reply path.
    pub async fn intercept_and_divert(&self, response: &Signal) -> bool {
        let Some(target) = diversion_target(response, &self.connection_id) else {
            return false;
        };

        let stamped = response.clone().with_header(
            keys::DIVERTED_RESPONSE_FROM_CONNECTION,
            self.connection_id.as_str(),
        );
        let entity_id = stamped.entity_id().clone();
        let receivers = self
            .bus
            .publish_response_for_diversion(stamped, target.clone(), entity_id, THINGS_GROUP)
            .await;

        DispatchMetrics::incr(&self.metrics.diversions);
        if receivers == 0 {
            debug!(
                connection_id = %self.connection_id,
                target = %target,
                correlation_id = ?response.correlation_id(),
                "Diverted response has no subscribers"
            );
        } else {
            info!(
                connection_id = %self.connection_id,
                target = %target,
                correlation_id = ?response.correlation_id(),
                "Response diverted"
            );
        }
        true
    }
}
