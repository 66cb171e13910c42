//! # Diverted Response Subscriber
//!
//! Subscription side of the diversion bus.

use crate::events::{DiversionFilter, DivertedResponse};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Diversion bus closed")]
    Closed,
}

/// Subscription handle for one connection's diverted responses.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<DivertedResponse>,
    filter: DiversionFilter,
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<DivertedResponse>,
        filter: DiversionFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            key,
        }
    }

    /// Receive the next response addressed to this connection.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<DivertedResponse> {
        loop {
            let response = match self.receiver.recv().await {
                Ok(r) => r,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Diversion subscriber lagged, responses dropped");
                    continue;
                }
            };

            if self.filter.matches(&response) {
                return Some(response);
            }
        }
    }

    /// Non-blocking receive. `Ok(None)` means nothing is pending.
    pub fn try_recv(&mut self) -> Result<Option<DivertedResponse>, SubscriptionError> {
        loop {
            let response = match self.receiver.try_recv() {
                Ok(r) => r,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&response) {
                return Ok(Some(response));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &DiversionFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        if let Some(count) = subs.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.key);
            }
        }
        debug!(connection = %self.key, "Diversion subscription dropped");
    }
}

/// `Stream` adapter over a [`Subscription`].
pub struct DivertedResponseStream {
    subscription: Subscription,
}

impl DivertedResponseStream {
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    #[must_use]
    pub fn filter(&self) -> &DiversionFilter {
        self.subscription.filter()
    }
}

impl Stream for DivertedResponseStream {
    type Item = DivertedResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(response)) => Poll::Ready(Some(response)),
            Ok(None) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::publisher::{DiversionPublisher, InMemoryDiversionBus};
    use shared_types::{ConnectionId, EntityId, Signal, StatusCode};
    use std::time::Duration;
    use tokio::time::timeout;

    fn thing() -> EntityId {
        EntityId::parse("ns:thing").unwrap()
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::parse(id).unwrap()
    }

    async fn publish(bus: &InMemoryDiversionBus, target: &str, name: &str) {
        let signal = Signal::response(name, thing(), StatusCode::OK);
        bus.publish_response_for_diversion(signal, conn(target), thing(), "things")
            .await;
    }

    #[tokio::test]
    async fn test_subscription_only_sees_own_connection() {
        let bus = InMemoryDiversionBus::new();
        let mut sub = bus.subscribe_for_diverted_responses(conn("conn-b"));

        publish(&bus, "conn-c", "retrieveThing").await;
        publish(&bus, "conn-b", "modifyThing").await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("response");

        assert_eq!(received.signal.name(), "modifyThing");
        assert_eq!(received.target_connection, conn("conn-b"));
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryDiversionBus::new();
        {
            let _sub1 = bus.subscribe_for_diverted_responses(conn("conn-b"));
            let _sub2 = bus.subscribe_for_diverted_responses(conn("conn-b"));
            assert_eq!(bus.subscriber_count(), 2);
        }
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.has_subscribers_for(&conn("conn-b")));
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryDiversionBus::new();
        let mut sub = bus.subscribe_for_diverted_responses(conn("conn-b"));
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_try_recv_filters_foreign() {
        let bus = InMemoryDiversionBus::new();
        let mut sub = bus.subscribe_for_diverted_responses(conn("conn-b"));
        publish(&bus, "conn-c", "modifyThing").await;
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[test]
    fn test_stream_filter() {
        let bus = InMemoryDiversionBus::new();
        let stream = bus.diverted_response_stream(conn("conn-b"));
        assert_eq!(stream.filter().connection_id, conn("conn-b"));
    }
}
