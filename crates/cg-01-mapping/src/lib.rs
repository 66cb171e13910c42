//! # CG-01 Payload Mapping
//!
//! Translates external messages into signals and back.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): pure logic, no I/O
//!   - `PlaceholderContext`: `{{ prefix:name }}` resolution
//!   - `Expression`: RQL subset for conditions and filters
//!   - `MappingOutcome`: mapped / dropped / error per mapper
//!
//! - **Ports Layer** (`ports/`): `MessageMapper`, `MapperFactory`
//!
//! - **Mappers** (`mappers/`): built-in engines `Ditto` (default),
//!   `Duplicate`, `ImplicitThingCreation`
//!
//! - **Service Layer** (`service/`):
//!   - `MapperRegistry`: named mapper definitions, fresh instance per run
//!   - `InboundMappingStage`, `OutboundMappingStage`
//!
//! ## Isolation
//!
//! Every pipeline run gets its own mapper instances. A mapper that panics
//! produces an `Error` outcome for itself only; sibling mappers still run.
//!
//! ## Usage Example
//!
//! ```ignore
//! let registry = Arc::new(MapperRegistry::for_connection(&connection)?);
//! let stage = InboundMappingStage::new(registry, &MappingConfig::default(), metrics);
//! for outcome in stage.process(&message) {
//!     match outcome {
//!         MappingOutcome::Mapped { mapped, .. } => forward(mapped),
//!         MappingOutcome::Dropped { .. } => {}
//!         MappingOutcome::Error { error, .. } => reply_with(error),
//!     }
//! }
//! ```

pub mod domain;
pub mod error;
pub mod mappers;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{
    Expression, MappingConfig, MappingOutcome, OutcomeCounts, PlaceholderContext, ValueResolver,
};
pub use error::{ExpressionError, MappingError, PlaceholderError, RegistryError};
pub use mappers::{builtin_factories, DEFAULT_MAPPER_ID};
pub use metrics::{MappingMetrics, MappingMetricsSnapshot};
pub use ports::{MapperContext, MapperFactory, MessageMapper};
pub use service::{
    group_targets, InboundMappingStage, InboundOutcome, MapperRegistry, OutboundMappingStage,
    OutboundOutcome, ResolvedMapper, TargetGroup,
};
