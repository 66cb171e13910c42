//! # Connection Pipeline
//!
//! Everything one connection needs to process a task end to end. The mapping
//! worker pool runs tasks through it.

use crate::metrics::DispatchMetrics;
use crate::ports::CommandRouter;
use crate::service::inbound::InboundDispatcher;
use crate::service::outbound::OutboundDispatcher;
use crate::service::pool::TaskRunner;
use crate::service::responses::{ResponseRoute, ResponseRouter};
use async_trait::async_trait;
use shared_types::{ExternalMessage, Signal};
use std::sync::Arc;
use tracing::{debug, warn};

/// One unit of work for a mapping worker.
#[derive(Debug, Clone)]
pub enum MappingTask {
    /// A message consumed by a source.
    Inbound(ExternalMessage),
    /// A signal to publish to the connection's targets.
    Outbound(Signal),
    /// A response to a previously forwarded command.
    Response(Signal),
}

impl MappingTask {
    pub fn kind(&self) -> &'static str {
        match self {
            MappingTask::Inbound(_) => "inbound",
            MappingTask::Outbound(_) => "outbound",
            MappingTask::Response(_) => "response",
        }
    }
}

pub struct ConnectionPipeline {
    inbound: Arc<InboundDispatcher>,
    outbound: Arc<OutboundDispatcher>,
    responses: Arc<ResponseRouter>,
    router: Arc<dyn CommandRouter>,
    metrics: Arc<DispatchMetrics>,
}

impl ConnectionPipeline {
    pub fn new(
        inbound: Arc<InboundDispatcher>,
        outbound: Arc<OutboundDispatcher>,
        responses: Arc<ResponseRouter>,
        router: Arc<dyn CommandRouter>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            inbound,
            outbound,
            responses,
            router,
            metrics,
        }
    }

    pub fn inbound(&self) -> &Arc<InboundDispatcher> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<OutboundDispatcher> {
        &self.outbound
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub async fn process(&self, task: MappingTask) {
        match task {
            MappingTask::Inbound(message) => self.run_inbound(message).await,
            MappingTask::Outbound(signal) => self.run_outbound(signal).await,
            MappingTask::Response(signal) => {
                if self.responses.handle(signal).await == ResponseRoute::Unrouted {
                    debug!("Response not routed to any destination");
                }
            }
        }
    }

    /// Dispatch, then settle in the background once the collector is done,
    /// so the worker is free for the next message.
    async fn run_inbound(&self, message: ExternalMessage) {
        match self.inbound.dispatch(&message).await {
            Ok(receipt) => {
                tokio::spawn(async move {
                    receipt.settle().await;
                });
            }
            Err(e) => {
                warn!(
                    correlation_id = ?message.headers().correlation_id(),
                    code = e.code(),
                    error = %e,
                    "Inbound dispatch failed"
                );
                if let Some(settlement) = message.settlement() {
                    settlement.reject(e.status().is_retryable());
                }
            }
        }
    }

    /// Publish, then send the target acknowledgements back to the requester.
    async fn run_outbound(&self, signal: Signal) {
        let acknowledgements = self.outbound.dispatch(&signal).await;
        if acknowledgements.is_empty() {
            return;
        }
        debug!(
            correlation_id = ?signal.correlation_id(),
            acks = acknowledgements.len(),
            status = %acknowledgements.status(),
            "Forwarding target acknowledgements"
        );
        self.router.forward(acknowledgements.into_signal()).await;
    }
}

#[async_trait]
impl TaskRunner for ConnectionPipeline {
    async fn run(&self, task: MappingTask) {
        self.process(task).await;
    }
}
