//! # Inbound Dispatch
//!
//! Takes one external message through mapping and admission, forwards the
//! admitted signals and arms a response collector for the message.
//!
//! ```text
//! ExternalMessage ──register──→ collector (unarmed)
//!        │
//!        ▼
//!   mapping stage ──→ Mapped ──admit──→ forward ─────┐ awaits response?
//!        │                     └─reject─→ error response ─┤ (reply + deliver)
//!        ├──→ Error ──────────────────→ error response ─┤
//!        └──→ Dropped                                    ▼
//!                                              arm(awaiting) → settle
//! ```
//!
//! Error responses are never forwarded. They go to the source's reply
//! target and into the message's own collector, so the settlement of the
//! message reflects them.

use crate::domain::admit;
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::ports::CommandRouter;
use crate::service::replies::ReplyTargetPublisher;
use cg_01_mapping::{InboundMappingStage, MappingOutcome};
use cg_02_acknowledgements::{
    CollectorError, CollectorOutput, ResponseCollectorStore, SettlementDecision,
};
use shared_types::{
    keys, Connection, CorrelationId, EntityId, ExternalMessage, Headers, Settlement, Signal,
    TopicPath,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// What happened to one inbound message, plus the pending collector output.
#[derive(Debug)]
pub struct InboundReceipt {
    pub correlation_id: String,
    pub forwarded: usize,
    pub rejected: usize,
    pub dropped: usize,
    /// Responses the collector waits for.
    pub awaiting: usize,
    output: oneshot::Receiver<CollectorOutput>,
    settlement: Option<Arc<dyn Settlement>>,
}

impl InboundReceipt {
    /// Wait for the collector to settle.
    pub async fn output(self) -> CollectorOutput {
        Self::await_output(self.output).await
    }

    /// Wait for the collector and settle the transport message with the
    /// result.
    pub async fn settle(self) -> SettlementDecision {
        let output = Self::await_output(self.output).await;
        let decision = SettlementDecision::from_output(&output);
        if let Some(settlement) = &self.settlement {
            decision.apply(settlement.as_ref());
        }
        debug!(
            correlation_id = %self.correlation_id,
            decision = ?decision,
            "Inbound message settled"
        );
        decision
    }

    async fn await_output(output: oneshot::Receiver<CollectorOutput>) -> CollectorOutput {
        // the store only drops a sender when it is itself dropped
        output.await.unwrap_or(CollectorOutput {
            all_arrived: false,
            responses: Vec::new(),
        })
    }
}

pub struct InboundDispatcher {
    connection: Arc<Connection>,
    mapping: Arc<InboundMappingStage>,
    router: Arc<dyn CommandRouter>,
    collectors: Arc<ResponseCollectorStore>,
    replies: Arc<ReplyTargetPublisher>,
    metrics: Arc<DispatchMetrics>,
}

impl InboundDispatcher {
    pub fn new(
        connection: Arc<Connection>,
        mapping: Arc<InboundMappingStage>,
        router: Arc<dyn CommandRouter>,
        collectors: Arc<ResponseCollectorStore>,
        replies: Arc<ReplyTargetPublisher>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            connection,
            mapping,
            router,
            collectors,
            replies,
            metrics,
        }
    }

    pub fn collectors(&self) -> &Arc<ResponseCollectorStore> {
        &self.collectors
    }

    pub async fn dispatch(&self, message: &ExternalMessage) -> Result<InboundReceipt, DispatchError> {
        let (correlation_id, output) = self.register(message)?;

        let mut forwarded = 0;
        let mut rejected = 0;
        let mut dropped = 0;
        let mut awaiting = 0;

        for outcome in self.mapping.process(message) {
            match outcome {
                MappingOutcome::Mapped { mapped, .. } => {
                    for signal in mapped {
                        match admit(signal.clone(), message, &self.connection, &correlation_id) {
                            Ok(admitted) => {
                                if admitted.awaits_response {
                                    awaiting += 1;
                                }
                                forwarded += 1;
                                DispatchMetrics::incr(&self.metrics.inbound_forwarded);
                                self.router.forward(admitted.signal).await;
                            }
                            Err(e) => {
                                rejected += 1;
                                warn!(
                                    correlation_id = %correlation_id,
                                    signal = %signal.name(),
                                    code = e.code(),
                                    error = %e,
                                    "Inbound signal rejected"
                                );
                                let headers = self
                                    .error_headers(message, &correlation_id)
                                    .merged(&inbound_mapper_header(&signal));
                                let response = Signal::error_response(
                                    signal.entity_id().clone(),
                                    e.status(),
                                    e.code(),
                                    e.to_string(),
                                    headers,
                                )
                                .with_channel(signal.channel());
                                if self.respond_with_error(&correlation_id, response).await {
                                    awaiting += 1;
                                }
                            }
                        }
                    }
                }
                MappingOutcome::Dropped { mapper_id, .. } => {
                    dropped += 1;
                    debug!(
                        correlation_id = %correlation_id,
                        mapper = %mapper_id,
                        "Inbound message dropped by mapper"
                    );
                }
                MappingOutcome::Error {
                    mapper_id,
                    error,
                    topic,
                    ..
                } => {
                    rejected += 1;
                    let entity_id = topic
                        .as_deref()
                        .and_then(TopicPath::parse)
                        .and_then(|t| t.entity_id())
                        .unwrap_or_else(EntityId::unknown);
                    let headers = self
                        .error_headers(message, &correlation_id)
                        .with(keys::INBOUND_PAYLOAD_MAPPER, mapper_id.as_str());
                    let response = Signal::error_response(
                        entity_id,
                        error.status(),
                        error.code(),
                        error.to_string(),
                        headers,
                    );
                    if self.respond_with_error(&correlation_id, response).await {
                        awaiting += 1;
                    }
                }
            }
        }

        self.collectors.arm(&correlation_id, awaiting)?;
        info!(
            correlation_id = %correlation_id,
            connection_id = %self.connection.id(),
            forwarded = forwarded,
            rejected = rejected,
            dropped = dropped,
            awaiting = awaiting,
            "Inbound message dispatched"
        );

        Ok(InboundReceipt {
            correlation_id,
            forwarded,
            rejected,
            dropped,
            awaiting,
            output,
            settlement: message.settlement().cloned(),
        })
    }

    /// Register the message's collector under its correlation id, or under a
    /// fresh one when the id is missing or already in flight.
    fn register(
        &self,
        message: &ExternalMessage,
    ) -> Result<(String, oneshot::Receiver<CollectorOutput>), DispatchError> {
        let requested_timeout = message.headers().timeout().ok().flatten();
        if let Some(id) = message.headers().correlation_id() {
            match self.collectors.register(id, requested_timeout) {
                Ok(rx) => return Ok((id.to_string(), rx)),
                Err(CollectorError::Duplicate(_)) => {
                    debug!(correlation_id = %id, "Correlation id in flight, assigning a fresh one");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let id = CorrelationId::new().to_string();
        let rx = self.collectors.register(&id, requested_timeout)?;
        Ok((id, rx))
    }

    fn error_headers(&self, message: &ExternalMessage, correlation_id: &str) -> Headers {
        let mut headers = message
            .headers()
            .without(keys::REQUESTED_ACKS)
            .with(keys::CORRELATION_ID, correlation_id);
        if let Some(binding) = message.source().filter(|b| b.source.reply_target.is_some()) {
            headers.insert(keys::REPLY_TARGET, binding.index.to_string());
        }
        headers
    }

    /// Publish an error response to the reply target and hand it to the
    /// message's collector. Returns whether the collector took it.
    async fn respond_with_error(&self, correlation_id: &str, response: Signal) -> bool {
        DispatchMetrics::incr(&self.metrics.inbound_rejected);
        self.replies.publish_response(&response).await;
        self.collectors.deliver(correlation_id, response).is_ok()
    }
}

fn inbound_mapper_header(signal: &Signal) -> Headers {
    signal
        .headers()
        .get(keys::INBOUND_PAYLOAD_MAPPER)
        .map(|mapper| Headers::new().with(keys::INBOUND_PAYLOAD_MAPPER, mapper))
        .unwrap_or_default()
}
