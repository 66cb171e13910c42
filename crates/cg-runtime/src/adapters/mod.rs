//! # Adapter Implementations
//!
//! Port implementations the binary wires into each connection when no
//! transport is attached:
//!
//! - `LoggingPublisher` - logs outbound publishes
//! - `log_forwarded` - drains and logs signals sent to command routing
//!
//! Enrichment uses `cg_03_dispatch::InMemoryThingStore`.

pub mod logging;

pub use logging::{log_forwarded, LoggingPublisher};
