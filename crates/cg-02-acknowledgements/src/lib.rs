//! # CG-02 Acknowledgements
//!
//! Correlates responses with the inbound messages that caused them and
//! aggregates acknowledgements for the signals published to targets.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`):
//!   - `AcknowledgementAggregator`: requested labels in, `Acknowledgements` out
//!   - `weak_acknowledgements`: answers for targets that will never publish
//!   - `SettlementDecision`: ack / reject / redeliver from a collector output
//!
//! - **Service Layer** (`service/`):
//!   - `ResponseCollectorStore`: concurrent map of armed collectors with
//!     per-entry deadline, swept by `cleanup_task`
//!
//! ## Collector lifecycle
//!
//! ```text
//! register ──> (responses may arrive) ──> arm(n) ──> n responses ──> Settled(all_arrived)
//!                                            └────> deadline ─────> Settled(partial)
//! ```
//!
//! Collectors share no state with each other; any thread delivering a
//! response may drive one to its terminal state.

pub mod domain;
pub mod error;
pub mod service;

// Re-exports for convenience
pub use domain::{
    weak_acknowledgements, AcknowledgementAggregator, AcknowledgementsConfig, CollectorOutput,
    SettlementDecision,
};
pub use error::CollectorError;
pub use service::{
    cleanup_task, CollectorStats, CollectorStatsSnapshot, ResponseCollectorStore,
};
