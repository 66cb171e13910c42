//! # Inbound Mapping Stage
//!
//! Runs the mapper list of a message's source over one external message and
//! reports one outcome per mapper that was not skipped.

use crate::domain::{MappingConfig, MappingOutcome, PlaceholderContext};
use crate::error::MappingError;
use crate::metrics::MappingMetrics;
use crate::service::registry::{MapperRegistry, ResolvedMapper};
use crate::service::panic_message;
use shared_types::{keys, ExternalMessage, Signal};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of inbound mapping: the signals one mapper produced.
pub type InboundOutcome = MappingOutcome<Vec<Signal>>;

pub struct InboundMappingStage {
    registry: Arc<MapperRegistry>,
    max_mapped: usize,
    metrics: Arc<MappingMetrics>,
}

impl InboundMappingStage {
    pub fn new(registry: Arc<MapperRegistry>, config: &MappingConfig, metrics: Arc<MappingMetrics>) -> Self {
        Self {
            registry,
            max_mapped: config.max_mapped_inbound_messages,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<MapperRegistry> {
        &self.registry
    }

    /// Map `message` with every mapper of its effective mapping list, in
    /// list order.
    pub fn process(&self, message: &ExternalMessage) -> Vec<InboundOutcome> {
        let names = MapperRegistry::effective_names(&message.payload_mapping());
        let ctx = PlaceholderContext::new()
            .with_headers(message.headers())
            .with_auth_context(message.auth_context())
            .with_connection(self.registry.connection_id());

        let mut outcomes = Vec::with_capacity(names.len());
        for name in &names {
            let outcome = match self.registry.instantiate(name) {
                Ok(mapper) => match self.apply(mapper, message, &ctx) {
                    Some(outcome) => outcome,
                    None => {
                        self.metrics.record_skipped();
                        continue;
                    }
                },
                Err(e) => error_outcome(name, e.into(), message),
            };
            self.metrics.record_inbound(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// `None` when the mapper was skipped by blocklist or condition.
    fn apply(
        &self,
        mut mapper: ResolvedMapper,
        message: &ExternalMessage,
        ctx: &PlaceholderContext<'_>,
    ) -> Option<InboundOutcome> {
        let id = mapper.id().to_string();

        if mapper.is_blocked(message.content_type()) {
            debug!(
                mapper = %id,
                content_type = ?message.content_type(),
                "Content type blocked, skipping mapper"
            );
            return None;
        }
        match mapper.incoming_conditions_hold(ctx) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(error_outcome(&id, e, message)),
        }

        let result = catch_unwind(AssertUnwindSafe(|| mapper.mapper_mut().map_inbound(message)));
        let outcome = match result {
            Err(panic) => error_outcome(
                &id,
                MappingError::Panicked {
                    mapper: id.clone(),
                    message: panic_message(panic.as_ref()),
                },
                message,
            ),
            Ok(Err(e)) => error_outcome(&id, e, message),
            Ok(Ok(signals)) if signals.is_empty() => {
                debug!(
                    mapper = %id,
                    correlation_id = ?message.headers().correlation_id(),
                    "Mapper dropped inbound message"
                );
                MappingOutcome::Dropped {
                    mapper_id: id,
                    message: Some(message.clone()),
                }
            }
            Ok(Ok(signals)) if signals.len() > self.max_mapped => error_outcome(
                &id,
                MappingError::TooManyMessages {
                    mapper: id.clone(),
                    produced: signals.len(),
                    max: self.max_mapped,
                },
                message,
            ),
            Ok(Ok(signals)) => MappingOutcome::Mapped {
                mapped: signals
                    .into_iter()
                    .map(|s| s.with_header(keys::INBOUND_PAYLOAD_MAPPER, id.as_str()))
                    .collect(),
                mapper_id: id,
            },
        };
        Some(outcome)
    }
}

fn error_outcome(mapper_id: &str, error: MappingError, message: &ExternalMessage) -> InboundOutcome {
    warn!(
        mapper = %mapper_id,
        correlation_id = ?message.headers().correlation_id(),
        error = %error,
        "Inbound mapping failed"
    );
    MappingOutcome::Error {
        mapper_id: mapper_id.to_string(),
        topic: error
            .topic()
            .map(str::to_string)
            .or_else(|| message.topic_path().map(str::to_string)),
        error,
        message: Some(message.clone()),
    }
}
