//! Counters for dispatch operations.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free dispatch counters.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub inbound_forwarded: AtomicU64,
    pub inbound_rejected: AtomicU64,
    pub outbound_published: AtomicU64,
    pub outbound_publish_failures: AtomicU64,
    pub weak_acks: AtomicU64,
    pub replies_published: AtomicU64,
    pub diversions: AtomicU64,
    pub enrichment_hits: AtomicU64,
    pub enrichment_misses: AtomicU64,
    pub enrichment_failures: AtomicU64,
    pub worker_panics: AtomicU64,
    pub queue_rejections: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            inbound_forwarded: self.inbound_forwarded.load(Ordering::Relaxed),
            inbound_rejected: self.inbound_rejected.load(Ordering::Relaxed),
            outbound_published: self.outbound_published.load(Ordering::Relaxed),
            outbound_publish_failures: self.outbound_publish_failures.load(Ordering::Relaxed),
            weak_acks: self.weak_acks.load(Ordering::Relaxed),
            replies_published: self.replies_published.load(Ordering::Relaxed),
            diversions: self.diversions.load(Ordering::Relaxed),
            enrichment_hits: self.enrichment_hits.load(Ordering::Relaxed),
            enrichment_misses: self.enrichment_misses.load(Ordering::Relaxed),
            enrichment_failures: self.enrichment_failures.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            queue_rejections: self.queue_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchMetricsSnapshot {
    pub inbound_forwarded: u64,
    pub inbound_rejected: u64,
    pub outbound_published: u64,
    pub outbound_publish_failures: u64,
    pub weak_acks: u64,
    pub replies_published: u64,
    pub diversions: u64,
    pub enrichment_hits: u64,
    pub enrichment_misses: u64,
    pub enrichment_failures: u64,
    pub worker_panics: u64,
    pub queue_rejections: u64,
}
