//! # Response Collector Store
//!
//! One collector per in-flight inbound message, keyed by correlation id.
//!
//! Flow:
//! 1. Inbound dispatch calls `register()` before mapping and keeps the receiver
//! 2. Responses arriving for the correlation id are handed to `deliver()`
//! 3. Once mapping knows how many responses to await it calls `arm()`
//! 4. The collector settles when the expected count is reached, or with the
//!    partial result when `remove_expired()` finds it past its deadline
//!
//! Arming with zero settles immediately.

use crate::domain::{AcknowledgementsConfig, CollectorOutput};
use crate::error::CollectorError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::Signal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct PendingCollector {
    sender: oneshot::Sender<CollectorOutput>,
    created_at: Instant,
    timeout: Duration,
    /// `None` until armed.
    expected: Option<usize>,
    responses: Vec<Signal>,
}

impl PendingCollector {
    fn is_complete(&self) -> bool {
        self.expected
            .is_some_and(|expected| self.responses.len() >= expected)
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.timeout
    }
}

/// Collector statistics
#[derive(Debug, Default)]
pub struct CollectorStats {
    pub total_registered: AtomicU64,
    pub total_settled: AtomicU64,
    pub total_timeouts: AtomicU64,
    /// Settled, but nobody was waiting for the output anymore.
    pub total_abandoned: AtomicU64,
    /// Responses for unknown or already settled collectors.
    pub total_unmatched: AtomicU64,
}

impl CollectorStats {
    pub fn snapshot(&self) -> CollectorStatsSnapshot {
        CollectorStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            settled: self.total_settled.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            abandoned: self.total_abandoned.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time collector statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectorStatsSnapshot {
    pub registered: u64,
    pub settled: u64,
    pub timeouts: u64,
    pub abandoned: u64,
    pub unmatched: u64,
}

pub struct ResponseCollectorStore {
    pending: DashMap<String, PendingCollector>,
    config: AcknowledgementsConfig,
    stats: Arc<CollectorStats>,
}

impl ResponseCollectorStore {
    pub fn new(config: AcknowledgementsConfig) -> Self {
        Self {
            pending: DashMap::new(),
            config,
            stats: Arc::new(CollectorStats::default()),
        }
    }

    pub fn config(&self) -> &AcknowledgementsConfig {
        &self.config
    }

    /// Register a collector and get the receiver of its output.
    ///
    /// `requested_timeout` is clamped to the configured maximum.
    pub fn register(
        &self,
        key: &str,
        requested_timeout: Option<Duration>,
    ) -> Result<oneshot::Receiver<CollectorOutput>, CollectorError> {
        let timeout = self.config.effective_timeout(requested_timeout);
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(key.to_string()) {
            Entry::Occupied(_) => return Err(CollectorError::Duplicate(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(PendingCollector {
                    sender: tx,
                    created_at: Instant::now(),
                    timeout,
                    expected: None,
                    responses: Vec::new(),
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %key,
            timeout_ms = timeout.as_millis(),
            "Registered response collector"
        );
        Ok(rx)
    }

    /// Set the number of responses to await.
    ///
    /// Returns `true` if the collector settled as a result.
    pub fn arm(&self, key: &str, expected: usize) -> Result<bool, CollectorError> {
        {
            let mut collector = self
                .pending
                .get_mut(key)
                .ok_or_else(|| CollectorError::Unknown(key.to_string()))?;
            if let Some(already) = collector.expected {
                return Err(CollectorError::AlreadyArmed {
                    key: key.to_string(),
                    expected: already,
                });
            }
            collector.expected = Some(expected);
        }
        debug!(correlation_id = %key, expected = expected, "Armed response collector");
        Ok(self.try_settle(key))
    }

    /// Hand a response to the collector of `key`.
    ///
    /// Returns `true` if this response settled the collector.
    pub fn deliver(&self, key: &str, response: Signal) -> Result<bool, CollectorError> {
        match self.pending.get_mut(key) {
            Some(mut collector) => collector.responses.push(response),
            None => {
                self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %key,
                    "Response for unknown or expired collector"
                );
                return Err(CollectorError::Unknown(key.to_string()));
            }
        }
        Ok(self.try_settle(key))
    }

    fn try_settle(&self, key: &str) -> bool {
        match self.pending.remove_if(key, |_, c| c.is_complete()) {
            Some((key, collector)) => {
                self.finish(&key, collector, true);
                true
            }
            None => false,
        }
    }

    fn finish(&self, key: &str, collector: PendingCollector, all_arrived: bool) {
        let elapsed = collector.created_at.elapsed();
        let output = CollectorOutput {
            all_arrived,
            responses: collector.responses,
        };
        let response_count = output.responses.len();

        self.stats.total_settled.fetch_add(1, Ordering::Relaxed);
        if !all_arrived {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        }
        if collector.sender.send(output).is_err() {
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %key, "Collector output receiver dropped");
            return;
        }
        debug!(
            correlation_id = %key,
            all_arrived = all_arrived,
            responses = response_count,
            elapsed_ms = elapsed.as_millis(),
            "Settled response collector"
        );
    }

    /// Settle every collector past its deadline with what it has.
    ///
    /// Returns the number of collectors settled.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            if let Some((key, collector)) = self.pending.remove_if(&key, |_, c| c.is_expired(now)) {
                warn!(
                    correlation_id = %key,
                    expected = ?collector.expected,
                    received = collector.responses.len(),
                    timeout_ms = collector.timeout.as_millis(),
                    "Response collector timed out"
                );
                self.finish(&key, collector, false);
                removed += 1;
            }
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }
}

/// Background task settling expired collectors.
pub async fn cleanup_task(store: Arc<ResponseCollectorStore>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Settled expired response collectors");
        }
    }
}
