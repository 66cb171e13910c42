//! Ports Layer - hexagonal architecture boundaries

pub mod outbound;

pub use outbound::{CommandRouter, Destination, EnrichmentFacade, Publisher};
