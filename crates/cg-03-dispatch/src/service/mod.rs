//! Service Layer - dispatch orchestration

pub mod diversion;
pub mod enrichment;
pub mod inbound;
pub mod outbound;
pub mod pipeline;
pub mod pool;
pub mod replies;
pub mod responses;

pub use diversion::ResponseDiversionInterceptor;
pub use enrichment::EnrichmentCache;
pub use inbound::{InboundDispatcher, InboundReceipt};
pub use outbound::OutboundDispatcher;
pub use pipeline::{ConnectionPipeline, MappingTask};
pub use pool::{MappingWorkerPool, TaskRunner};
pub use replies::ReplyTargetPublisher;
pub use responses::{ResponseRoute, ResponseRouter};
