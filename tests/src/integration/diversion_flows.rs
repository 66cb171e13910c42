//! # Response Diversion Flows
//!
//! ```text
//! [source-conn] response ──→ interceptor ──→ diversion bus ──→ [target-conn] subscription
//!                                │
//!                                └── not diverted: own reply path
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cg_03_dispatch::{diversion_target, DispatchMetrics, ResponseDiversionInterceptor};
    use shared_bus::{DiversionPublisher, InMemoryDiversionBus};
    use shared_types::{keys, ConnectionId, EntityId, Signal, StatusCode};

    use crate::integration::fixtures::conn;

    fn response(status: StatusCode) -> Signal {
        Signal::response("modifyThing", EntityId::parse("ns:lamp").unwrap(), status)
            .with_header(keys::CORRELATION_ID, "c-div")
    }

    fn interceptor(bus: Arc<InMemoryDiversionBus>) -> (ResponseDiversionInterceptor, Arc<DispatchMetrics>) {
        let metrics = Arc::new(DispatchMetrics::new());
        (
            ResponseDiversionInterceptor::new(conn("source-conn"), bus, metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_expected_response_type_is_diverted_and_stamped() {
        let bus = Arc::new(InMemoryDiversionBus::new());
        let mut subscription = bus.subscribe_for_diverted_responses(conn("target-conn"));
        let (interceptor, metrics) = interceptor(bus.clone());

        let signal = response(StatusCode::NO_CONTENT)
            .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "target-conn")
            .with_header(keys::DIVERT_EXPECTED_RESPONSE_TYPES, "response");
        assert_eq!(
            diversion_target(&signal, &conn("source-conn")),
            Some(conn("target-conn"))
        );

        assert!(interceptor.intercept_and_divert(&signal).await);

        let diverted = subscription.recv().await.unwrap();
        assert_eq!(diverted.source_connection(), Some("source-conn"));
        assert_eq!(diverted.signal.correlation_id(), Some("c-div"));
        assert_eq!(bus.responses_published(), 1);
        assert_eq!(metrics.snapshot().diversions, 1);
    }

    #[tokio::test]
    async fn test_unexpected_response_type_stays_on_own_path() {
        let bus = Arc::new(InMemoryDiversionBus::new());
        let (interceptor, _) = interceptor(bus.clone());

        let success_only_errors_expected = response(StatusCode::NO_CONTENT)
            .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "target-conn")
            .with_header(keys::DIVERT_EXPECTED_RESPONSE_TYPES, "error");
        assert!(!interceptor.intercept_and_divert(&success_only_errors_expected).await);

        let error = response(StatusCode::NOT_FOUND)
            .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "target-conn")
            .with_header(keys::DIVERT_EXPECTED_RESPONSE_TYPES, "error");
        assert!(interceptor.intercept_and_divert(&error).await);
        assert_eq!(bus.responses_published(), 1);
    }

    #[tokio::test]
    async fn test_nothing_is_published_without_a_valid_foreign_target() {
        let bus = Arc::new(InMemoryDiversionBus::new());
        let (interceptor, metrics) = interceptor(bus.clone());

        let cases = [
            response(StatusCode::NO_CONTENT),
            response(StatusCode::NO_CONTENT)
                .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "source-conn"),
            response(StatusCode::NO_CONTENT)
                .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "not a valid id!"),
            response(StatusCode::NO_CONTENT).with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, ""),
            Signal::event("thingModified", EntityId::parse("ns:lamp").unwrap())
                .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "target-conn"),
        ];
        for signal in &cases {
            assert!(diversion_target(signal, &conn("source-conn")).is_none());
            assert!(!interceptor.intercept_and_divert(signal).await);
        }

        assert_eq!(bus.responses_published(), 0);
        assert_eq!(metrics.snapshot().diversions, 0);
    }

    #[tokio::test]
    async fn test_diverted_response_is_not_diverted_again() {
        let bus = Arc::new(InMemoryDiversionBus::new());
        let mut subscription = bus.subscribe_for_diverted_responses(conn("target-conn"));
        let (first_hop, _) = interceptor(bus.clone());
        let second_hop = ResponseDiversionInterceptor::new(
            conn("target-conn"),
            bus.clone(),
            Arc::new(DispatchMetrics::new()),
        );

        let signal = response(StatusCode::NO_CONTENT)
            .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, "target-conn");
        assert!(first_hop.intercept_and_divert(&signal).await);
        let diverted = subscription.recv().await.unwrap();

        let back = ConnectionId::parse("source-conn").unwrap();
        let bounced = diverted
            .signal
            .with_header(keys::DIVERT_RESPONSE_TO_CONNECTION, back.as_str());
        assert!(!second_hop.intercept_and_divert(&bounced).await);
        assert_eq!(bus.responses_published(), 1);
    }
}
