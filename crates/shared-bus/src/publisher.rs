//! # Diversion Publisher
//!
//! Publishing side of the diversion bus.

use crate::events::{DiversionFilter, DivertedResponse};
use crate::subscriber::{DivertedResponseStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::{ConnectionId, EntityId, Signal};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Publishes responses for diversion to another connection.
#[async_trait]
pub trait DiversionPublisher: Send + Sync {
    /// Publish `signal` for `target_connection`.
    ///
    /// Returns the number of subscribers the response was handed to.
    async fn publish_response_for_diversion(
        &self,
        signal: Signal,
        target_connection: ConnectionId,
        entity_id: EntityId,
        group: &str,
    ) -> usize;

    /// Total responses published so far.
    fn responses_published(&self) -> u64;
}

/// In-memory diversion bus backed by `tokio::sync::broadcast`.
///
/// Suitable for a single gateway instance. A clustered deployment would
/// route diverted responses through the cluster pub/sub instead.
pub struct InMemoryDiversionBus {
    sender: broadcast::Sender<DivertedResponse>,

    /// Active subscription count by connection id.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    responses_published: AtomicU64,

    capacity: usize,
}

impl InMemoryDiversionBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            responses_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to responses diverted to `connection_id`.
    #[must_use]
    pub fn subscribe_for_diverted_responses(&self, connection_id: ConnectionId) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = connection_id.to_string();

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(key.clone()).or_insert(0) += 1;
        }

        debug!(connection = %connection_id, "Subscribed for diverted responses");

        Subscription::new(
            receiver,
            DiversionFilter::for_connection(connection_id),
            self.subscriptions.clone(),
            key,
        )
    }

    /// Stream of responses diverted to `connection_id`.
    #[must_use]
    pub fn diverted_response_stream(&self, connection_id: ConnectionId) -> DivertedResponseStream {
        DivertedResponseStream::new(self.subscribe_for_diverted_responses(connection_id))
    }

    /// Whether some connection currently listens for diverted responses.
    #[must_use]
    pub fn has_subscribers_for(&self, connection_id: &ConnectionId) -> bool {
        self.subscriptions
            .read()
            .map(|subs| subs.get(connection_id.as_str()).copied().unwrap_or(0) > 0)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryDiversionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiversionPublisher for InMemoryDiversionBus {
    async fn publish_response_for_diversion(
        &self,
        signal: Signal,
        target_connection: ConnectionId,
        entity_id: EntityId,
        group: &str,
    ) -> usize {
        self.responses_published.fetch_add(1, Ordering::Relaxed);

        let response = DivertedResponse {
            signal,
            target_connection,
            entity_id,
            group: group.to_string(),
        };
        let target = response.target_connection.clone();

        match self.sender.send(response) {
            Ok(receivers) => {
                debug!(
                    target = %target,
                    receivers = receivers,
                    "Diverted response published"
                );
                receivers
            }
            Err(e) => {
                warn!(
                    target = %target,
                    error = %e,
                    "Diverted response dropped (no receivers)"
                );
                0
            }
        }
    }

    fn responses_published(&self) -> u64 {
        self.responses_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::StatusCode;

    fn thing() -> EntityId {
        EntityId::parse("ns:thing").unwrap()
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::parse(id).unwrap()
    }

    fn response() -> Signal {
        Signal::response("modifyThing", thing(), StatusCode::NO_CONTENT)
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryDiversionBus::new();
        let receivers = bus
            .publish_response_for_diversion(response(), conn("conn-b"), thing(), "things")
            .await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.responses_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryDiversionBus::new();
        let _sub = bus.subscribe_for_diverted_responses(conn("conn-b"));

        let receivers = bus
            .publish_response_for_diversion(response(), conn("conn-b"), thing(), "things")
            .await;

        assert_eq!(receivers, 1);
        assert!(bus.has_subscribers_for(&conn("conn-b")));
        assert!(!bus.has_subscribers_for(&conn("conn-c")));
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryDiversionBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.responses_published(), 0);
    }
}
