//! # Diverted-Response Reception
//!
//! Responses another connection diverted to this one enter the normal
//! outbound path and reach the targets subscribed to `DivertedResponses`.
//! They carry their provenance header, so they are never diverted again.

use crate::wiring::ConnectionRuntime;
use shared_bus::Subscription;
use std::sync::Arc;
use tracing::{debug, warn};

/// Forward diverted responses until the subscription or the pool closes.
pub async fn receive_diverted_responses(
    mut subscription: Subscription,
    connection: Arc<ConnectionRuntime>,
) {
    while let Some(diverted) = subscription.recv().await {
        debug!(
            connection = %connection.id(),
            from = ?diverted.source_connection(),
            entity = %diverted.entity_id,
            correlation_id = ?diverted.signal.correlation_id(),
            "Received diverted response"
        );
        if let Err(e) = connection.submit_outbound(diverted.signal).await {
            warn!(
                connection = %connection.id(),
                error = %e,
                "Stopping diverted-response reception"
            );
            break;
        }
    }
    debug!(connection = %connection.id(), "Diverted-response subscription closed");
}
