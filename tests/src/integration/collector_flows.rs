//! # Response Collection Flows
//!
//! Admission decides which acknowledgements an inbound command waits for;
//! the collector gathers them and decides how the transport settles.
//!
//! ```text
//! admit ──→ active labels ──→ register + arm(n) ──→ deliver × n ──→ CollectorOutput
//!                                                       │
//!                                            deadline ──┘ (all_arrived = false)
//! ```

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use cg_02_acknowledgements::{
        AcknowledgementsConfig, ResponseCollectorStore, SettlementDecision,
    };
    use cg_03_dispatch::admit;
    use proptest::prelude::*;
    use shared_types::{
        keys, AckLabel, Channel, EntityId, ExternalMessage, Headers, Signal, Source, StatusCode,
    };

    use crate::integration::fixtures::connection;

    fn thing() -> EntityId {
        EntityId::parse("ns:lamp").unwrap()
    }

    #[tokio::test]
    async fn test_live_timeout_is_the_only_failure() {
        let store = ResponseCollectorStore::new(AcknowledgementsConfig::default());
        let output_rx = store.register("c-1", None).unwrap();
        assert!(!store.arm("c-1", 2).unwrap());

        let success = Signal::response("modifyThing", thing(), StatusCode::NO_CONTENT);
        let live_timeout = Signal::response("sendMessage", thing(), StatusCode::REQUEST_TIMEOUT)
            .with_channel(Channel::Live);
        assert!(!store.deliver("c-1", success).unwrap());
        assert!(store.deliver("c-1", live_timeout.clone()).unwrap());

        let output = output_rx.await.unwrap();
        assert!(output.all_arrived);
        assert_eq!(output.failed_responses(), vec![&live_timeout]);
        assert_eq!(
            SettlementDecision::from_output(&output),
            SettlementDecision::Reject { redeliver: true }
        );
    }

    #[tokio::test]
    async fn test_deadline_settles_with_partial_responses() {
        let store = ResponseCollectorStore::new(AcknowledgementsConfig::default());
        let output_rx = store
            .register("c-2", Some(Duration::from_millis(10)))
            .unwrap();
        store.arm("c-2", 2).unwrap();
        store
            .deliver("c-2", Signal::response("modifyThing", thing(), StatusCode::NO_CONTENT))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.remove_expired(), 1);

        let output = output_rx.await.unwrap();
        assert!(!output.all_arrived);
        assert_eq!(output.responses.len(), 1);
        assert_eq!(store.stats().snapshot().timeouts, 1);

        // late arrivals find nothing to deliver to
        assert!(store
            .deliver("c-2", Signal::response("modifyThing", thing(), StatusCode::NO_CONTENT))
            .is_err());
    }

    // =========================================================================
    // PROPERTY: active requests are exactly requested ∩ declared
    // =========================================================================

    const DECLARABLE: [&str; 3] = ["conn-in:a", "conn-in:b", "conn-in:c"];
    const REQUESTABLE: [&str; 5] = ["conn-in:a", "conn-in:b", "conn-in:c", "other:d", "twin-persisted"];

    proptest! {
        #[test]
        fn test_active_requests_are_requested_and_declared(
            declared in proptest::sample::subsequence(DECLARABLE.to_vec(), 0..=DECLARABLE.len()),
            requested in proptest::sample::subsequence(REQUESTABLE.to_vec(), 0..=REQUESTABLE.len()),
        ) {
            let declared: Vec<AckLabel> = declared.iter().map(|l| AckLabel::parse(l).unwrap()).collect();
            let conn = connection(
                "conn-in",
                vec![Source { declared_acks: declared.clone(), ..Default::default() }],
                vec![],
                Default::default(),
            );
            let message = ExternalMessage::builder(Headers::new())
                .source(conn.source(0).unwrap())
                .build();
            let command = Signal::command("modifyThing", thing())
                .with_header(keys::REQUESTED_ACKS, requested.join(","));

            let admitted = admit(command, &message, &conn, "c-prop").unwrap();

            let active: BTreeSet<String> = admitted
                .signal
                .requested_acks()
                .unwrap()
                .iter()
                .map(|l| l.as_str().to_string())
                .collect();
            let expected: BTreeSet<String> = requested
                .iter()
                .filter(|l| declared.iter().any(|d| d.as_str() == **l))
                .map(|l| l.to_string())
                .collect();
            prop_assert_eq!(active, expected);
            prop_assert_eq!(admitted.signal.correlation_id(), Some("c-prop"));
        }
    }
}
