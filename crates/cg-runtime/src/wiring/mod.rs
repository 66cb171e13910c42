//! # Connection Wiring
//!
//! Each connection gets its own pipeline and worker pool. Connections only
//! share the diversion bus.
//!
//! ```text
//!  source adapter ──submit_inbound──→ ┌────────────────────┐ ──→ CommandRouter
//!  command routing ─submit_response─→ │ ConnectionRuntime  │ ──→ Publisher
//!  signals ────────submit_outbound──→ │  (pool + pipeline) │ ──→ diversion bus
//!                                     └────────────────────┘          │
//!              receive_diverted_responses ←── subscription ←──────────┘
//! ```

pub mod connection;
pub mod diversion;

pub use connection::{ConnectionPorts, ConnectionRuntime};
pub use diversion::receive_diverted_responses;
