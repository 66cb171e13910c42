//! Domain layer: aggregation rules, no I/O.

pub mod aggregator;
pub mod config;
pub mod output;
pub mod settlement;
pub mod weak;

pub use aggregator::AcknowledgementAggregator;
pub use config::AcknowledgementsConfig;
pub use output::CollectorOutput;
pub use settlement::SettlementDecision;
pub use weak::weak_acknowledgements;
