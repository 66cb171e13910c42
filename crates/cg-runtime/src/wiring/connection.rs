//! # Connection Wiring
//!
//! Builds the processing pipeline of one connection from its configuration
//! and the adapters supplied for its transports.

use crate::container::GatewayConfig;
use cg_01_mapping::{InboundMappingStage, MapperRegistry, MappingMetrics, OutboundMappingStage, RegistryError};
use cg_02_acknowledgements::ResponseCollectorStore;
use cg_03_dispatch::{
    CommandRouter, ConnectionPipeline, DispatchError, DispatchMetrics, EnrichmentCache,
    EnrichmentFacade, InboundDispatcher, MappingTask, MappingWorkerPool, OutboundDispatcher,
    Publisher, ReplyTargetPublisher, ResponseDiversionInterceptor, ResponseRouter,
};
use shared_bus::DiversionPublisher;
use shared_types::{Connection, ConnectionId, ExternalMessage, Signal};
use std::sync::Arc;
use tracing::info;

/// Adapters a connection talks to.
#[derive(Clone)]
pub struct ConnectionPorts {
    pub publisher: Arc<dyn Publisher>,
    pub router: Arc<dyn CommandRouter>,
    pub enrichment: Arc<dyn EnrichmentFacade>,
}

/// A running connection: pipeline, worker pool and collectors.
pub struct ConnectionRuntime {
    connection: Arc<Connection>,
    pool: MappingWorkerPool,
    collectors: Arc<ResponseCollectorStore>,
    dispatch_metrics: Arc<DispatchMetrics>,
    mapping_metrics: Arc<MappingMetrics>,
}

impl ConnectionRuntime {
    /// Wire and start the connection. Must be called inside a Tokio runtime.
    pub fn start(
        connection: Connection,
        config: &GatewayConfig,
        ports: ConnectionPorts,
        bus: Arc<dyn DiversionPublisher>,
    ) -> Result<Self, RegistryError> {
        let connection = Arc::new(connection);
        let registry = Arc::new(MapperRegistry::for_connection(&connection)?);
        let mapping_metrics = Arc::new(MappingMetrics::new());
        let dispatch_metrics = Arc::new(DispatchMetrics::new());

        let inbound_mapping = Arc::new(InboundMappingStage::new(
            registry.clone(),
            &config.mapping,
            mapping_metrics.clone(),
        ));
        let outbound_mapping = Arc::new(OutboundMappingStage::new(
            registry,
            &config.mapping,
            mapping_metrics.clone(),
        ));
        let collectors = Arc::new(ResponseCollectorStore::new(
            config.acknowledgements.clone(),
        ));

        let replies = Arc::new(ReplyTargetPublisher::new(
            connection.clone(),
            outbound_mapping.clone(),
            ports.publisher.clone(),
            dispatch_metrics.clone(),
        ));
        let inbound = Arc::new(InboundDispatcher::new(
            connection.clone(),
            inbound_mapping,
            ports.router.clone(),
            collectors.clone(),
            replies.clone(),
            dispatch_metrics.clone(),
        ));
        let enrichment = Arc::new(EnrichmentCache::new(
            ports.enrichment,
            &config.enrichment,
            dispatch_metrics.clone(),
        ));
        let outbound = Arc::new(OutboundDispatcher::new(
            connection.clone(),
            outbound_mapping,
            ports.publisher,
            enrichment,
            config.acknowledgements.clone(),
            dispatch_metrics.clone(),
        ));
        let diversion = Arc::new(ResponseDiversionInterceptor::new(
            connection.id().clone(),
            bus,
            dispatch_metrics.clone(),
        ));
        let responses = Arc::new(ResponseRouter::new(collectors.clone(), diversion, replies));

        let pipeline = Arc::new(ConnectionPipeline::new(
            inbound,
            outbound,
            responses,
            ports.router,
            dispatch_metrics.clone(),
        ));
        let pool = MappingWorkerPool::start(pipeline, &config.mapping, dispatch_metrics.clone());

        info!(
            connection = %connection.id(),
            sources = connection.sources().len(),
            targets = connection.targets().len(),
            "Connection started"
        );

        Ok(Self {
            connection,
            pool,
            collectors,
            dispatch_metrics,
            mapping_metrics,
        })
    }

    pub fn id(&self) -> &ConnectionId {
        self.connection.id()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn collectors(&self) -> &Arc<ResponseCollectorStore> {
        &self.collectors
    }

    pub fn dispatch_metrics(&self) -> &Arc<DispatchMetrics> {
        &self.dispatch_metrics
    }

    pub fn mapping_metrics(&self) -> &Arc<MappingMetrics> {
        &self.mapping_metrics
    }

    /// A message consumed by one of the connection's sources.
    pub async fn submit_inbound(&self, message: ExternalMessage) -> Result<(), DispatchError> {
        self.pool.submit(MappingTask::Inbound(message)).await
    }

    /// A signal to publish to the connection's targets.
    pub async fn submit_outbound(&self, signal: Signal) -> Result<(), DispatchError> {
        self.pool.submit(MappingTask::Outbound(signal)).await
    }

    /// A response from command routing to a command this connection forwarded.
    pub async fn submit_response(&self, response: Signal) -> Result<(), DispatchError> {
        self.pool.submit(MappingTask::Response(response)).await
    }

    /// Finish queued work and stop the workers.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        info!(connection = %self.connection.id(), "Connection stopped");
    }
}
