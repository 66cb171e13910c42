//! # CG-03 Dispatch
//!
//! Moves mapped signals between a connection and the rest of the gateway.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure logic, no I/O
//!   - `admit`: enforcement, declared labels, acknowledgement-request filtering
//!   - `diversion_target`: whether a response leaves for another connection
//!   - `filter_admits`, `address_messages`: per-target filters and addressing
//!
//! - **Ports Layer** (`ports/`): `Publisher`, `CommandRouter`, `EnrichmentFacade`
//!
//! - **Adapters Layer** (`adapters/`): in-process implementations of the ports
//!
//! - **Service Layer** (`service/`):
//!   - `InboundDispatcher`: mapping, admission, forwarding, collector arming
//!   - `OutboundDispatcher`: target grouping, enrichment, publishing, acks
//!   - `ResponseRouter`: collector, diversion or reply target
//!   - `MappingWorkerPool`: bounded workers running `ConnectionPipeline`s
//!
//! ## Data Flow
//!
//! ```text
//! source ──ExternalMessage──→ InboundDispatcher ──Signal──→ CommandRouter
//!                                    │                          │
//!                            ResponseCollector ←──response── ResponseRouter
//!                                    │                          ├──→ diversion bus
//!                                 settle                        └──→ reply target
//!
//! Signal ──→ OutboundDispatcher ──(enrich)──map──→ Publisher ──→ targets
//!                   └──→ Acknowledgements ──→ CommandRouter
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! let pipeline = Arc::new(ConnectionPipeline::new(inbound, outbound, responses, router, metrics.clone()));
//! let pool = MappingWorkerPool::start(pipeline, &MappingConfig::default(), metrics);
//! pool.submit(MappingTask::Inbound(message)).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use adapters::{ChannelCommandRouter, InMemoryThingStore, RecordingPublisher};
pub use domain::{
    address_messages, admit, diversion_target, filter_admits, resolve_header_mapping, Addressed,
    AdmittedSignal, DiversionConfig, EnrichmentConfig,
};
pub use error::{DispatchError, EnrichmentError, PublishError};
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
pub use ports::{CommandRouter, Destination, EnrichmentFacade, Publisher};
pub use service::{
    ConnectionPipeline, EnrichmentCache, InboundDispatcher, InboundReceipt, MappingTask,
    MappingWorkerPool, OutboundDispatcher, ReplyTargetPublisher, ResponseDiversionInterceptor,
    ResponseRoute, ResponseRouter, TaskRunner,
};
