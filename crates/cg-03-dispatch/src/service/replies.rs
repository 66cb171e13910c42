//! # Reply Targets
//!
//! Publishes responses back through the reply target of the source the
//! original command arrived on. The source index travels in the
//! `reply-target` header stamped at admission.

use crate::domain::address_messages;
use crate::metrics::DispatchMetrics;
use crate::ports::{Destination, Publisher};
use cg_01_mapping::{MappingOutcome, OutboundMappingStage, PlaceholderContext};
use shared_types::{Connection, Signal};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ReplyTargetPublisher {
    connection: Arc<Connection>,
    mapping: Arc<OutboundMappingStage>,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<DispatchMetrics>,
}

impl ReplyTargetPublisher {
    pub fn new(
        connection: Arc<Connection>,
        mapping: Arc<OutboundMappingStage>,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            connection,
            mapping,
            publisher,
            metrics,
        }
    }

    /// Publish `response` to its reply target.
    ///
    /// Returns `true` when at least one message was published.
    pub async fn publish_response(&self, response: &Signal) -> bool {
        let index = match response.headers().reply_target() {
            Ok(Some(index)) => index,
            Ok(None) => return false,
            Err(e) => {
                warn!(
                    correlation_id = ?response.correlation_id(),
                    error = %e,
                    "Ignoring invalid reply-target header"
                );
                return false;
            }
        };
        let Some(binding) = self.connection.source(index) else {
            warn!(
                connection_id = %self.connection.id(),
                source = index,
                "Reply target points to unknown source"
            );
            return false;
        };
        let Some(reply_target) = binding.source.reply_target.as_ref() else {
            return false;
        };
        let Some(response_type) = response.response_type() else {
            return false;
        };
        if !reply_target.expects(response_type) {
            debug!(
                correlation_id = ?response.correlation_id(),
                response_type = response_type.as_str(),
                "Response type not expected by reply target"
            );
            return false;
        }

        let ctx = PlaceholderContext::new()
            .with_signal(response)
            .with_headers(response.headers())
            .with_connection(self.connection.id());

        let mut published = 0usize;
        for outcome in self.mapping.process(response, &binding.source.payload_mapping) {
            let MappingOutcome::Mapped { mapped, .. } = outcome else {
                continue;
            };
            let addressed = match address_messages(
                &reply_target.address,
                &reply_target.header_mapping,
                &mapped,
                &ctx,
            ) {
                Ok(addressed) => addressed,
                Err(e) => {
                    warn!(
                        correlation_id = ?response.correlation_id(),
                        address = %reply_target.address,
                        error = %e,
                        "Reply target address could not be resolved"
                    );
                    continue;
                }
            };
            for item in addressed {
                let destination = Destination::Reply {
                    source_index: index,
                    address: item.address,
                };
                match self.publisher.publish(item.message, &destination).await {
                    Ok(()) => published += 1,
                    Err(e) => warn!(
                        correlation_id = ?response.correlation_id(),
                        address = %destination.address(),
                        error = %e,
                        "Publishing reply failed"
                    ),
                }
            }
        }

        DispatchMetrics::add(&self.metrics.replies_published, published);
        published > 0
    }
}
