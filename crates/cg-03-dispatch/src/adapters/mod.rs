//! Adapters Layer (Driven Adapters)
//!
//! In-process implementations of the outbound ports. Transport adapters
//! (AMQP, MQTT, Kafka, HTTP) live outside this crate and implement the same
//! traits.
//!
//! - `ChannelCommandRouter` - forwards admitted signals into an mpsc channel
//! - `RecordingPublisher` - records publishes, can fail chosen addresses
//! - `InMemoryThingStore` - answers enrichment retrievals

pub mod publisher;
pub mod router;
pub mod thing_store;

pub use publisher::RecordingPublisher;
pub use router::ChannelCommandRouter;
pub use thing_store::InMemoryThingStore;
