//! Counters for mapping operations.

use crate::domain::MappingOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free mapping counters, shared by all workers of a connection.
#[derive(Debug, Default)]
pub struct MappingMetrics {
    pub inbound_mapped: AtomicU64,
    pub inbound_dropped: AtomicU64,
    pub inbound_errors: AtomicU64,
    pub outbound_mapped: AtomicU64,
    pub outbound_dropped: AtomicU64,
    pub outbound_errors: AtomicU64,
    /// Mappers skipped by blocklist or condition.
    pub skipped: AtomicU64,
}

impl MappingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inbound<T>(&self, outcome: &MappingOutcome<T>) {
        let counter = match outcome {
            MappingOutcome::Mapped { .. } => &self.inbound_mapped,
            MappingOutcome::Dropped { .. } => &self.inbound_dropped,
            MappingOutcome::Error { .. } => &self.inbound_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound<T>(&self, outcome: &MappingOutcome<T>) {
        let counter = match outcome {
            MappingOutcome::Mapped { .. } => &self.outbound_mapped,
            MappingOutcome::Dropped { .. } => &self.outbound_dropped,
            MappingOutcome::Error { .. } => &self.outbound_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MappingMetricsSnapshot {
        MappingMetricsSnapshot {
            inbound_mapped: self.inbound_mapped.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            inbound_errors: self.inbound_errors.load(Ordering::Relaxed),
            outbound_mapped: self.outbound_mapped.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
            outbound_errors: self.outbound_errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingMetricsSnapshot {
    pub inbound_mapped: u64,
    pub inbound_dropped: u64,
    pub inbound_errors: u64,
    pub outbound_mapped: u64,
    pub outbound_dropped: u64,
    pub outbound_errors: u64,
    pub skipped: u64,
}
