//! Service layer: the concurrent collector store.

pub mod collector;

pub use collector::{
    cleanup_task, CollectorStats, CollectorStatsSnapshot, ResponseCollectorStore,
};
