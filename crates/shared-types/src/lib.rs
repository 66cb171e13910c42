//! # Shared Types Crate
//!
//! This crate contains the canonical signal model that flows through the
//! connectivity gateway, together with the external message representation
//! and the (read-only) connection configuration.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-stage types are defined here.
//! - **Immutable Values**: `Signal` and `ExternalMessage` are never mutated in
//!   place by a pipeline stage; stages derive new values (`with_headers`,
//!   `Headers::with`) instead.
//! - **Protocol Neutrality**: Nothing in here knows about AMQP, MQTT, Kafka or
//!   HTTP. Transport adapters translate into `ExternalMessage`.
//!
//! ## Clusters
//!
//! - **Headers**: `Headers` (ordered, case-insensitive) and the header contract
//! - **Identity**: `EntityId`, `ConnectionId`, `CorrelationId`
//! - **Signals**: `Signal`, `SignalKind`, `Channel`, `ResponseType`, `TopicPath`
//! - **Acknowledgements**: `AckLabel`, `Acknowledgement`, `Acknowledgements`
//! - **External**: `ExternalMessage`, `Payload`, `AuthorizationContext`
//! - **Connection**: `Connection`, `Source`, `Target`, `MappingDefinition`

pub mod acknowledgement;
pub mod connection;
pub mod errors;
pub mod headers;
pub mod ids;
pub mod message;
pub mod signal;
pub mod status;

pub use acknowledgement::{AckLabel, Acknowledgement, Acknowledgements};
pub use connection::{
    Connection, Enforcement, FieldSelector, FilteredTopic, HeaderMapping, MappingDefinition,
    ReplyTarget, Source, SourceBinding, Target, Topic,
};
pub use errors::*;
pub use headers::{keys, Headers};
pub use ids::{ConnectionId, CorrelationId, EntityId};
pub use message::{AuthorizationContext, ExternalMessage, ExternalMessageBuilder, Payload, Settlement};
pub use signal::{Channel, Criterion, ResponseType, Signal, SignalKind, TopicPath, THINGS_GROUP};
pub use status::StatusCode;
