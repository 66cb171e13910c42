//! # Outbound Dispatch Flows
//!
//! Target grouping and per-target acknowledgements:
//!
//! ```text
//! Signal ──→ candidates ──→ group by (mappers, enrichment) ──→ map once per group
//!                                                                   │
//!                          one ack per requested issued label ←── publish to members
//! ```

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use cg_01_mapping::group_targets;
    use cg_03_dispatch::PublishError;
    use proptest::prelude::*;
    use serde_json::json;
    use shared_types::{
        keys, AckLabel, EntityId, FilteredTopic, Signal, StatusCode, Target, Topic,
    };

    use crate::integration::fixtures::{
        connection, definition, registry, CountingMapperFactory, OutboundHarness,
    };

    fn target(address: &str, mapping: &[&str], label: &str) -> Target {
        Target {
            address: address.into(),
            topics: vec![FilteredTopic::new(Topic::TwinEvents)],
            payload_mapping: mapping.iter().map(|m| m.to_string()).collect(),
            issued_ack_label: Some(AckLabel::parse(label).unwrap()),
            ..Default::default()
        }
    }

    fn event(requested: &str) -> Signal {
        Signal::event("attributeModified", EntityId::parse("ns:lamp").unwrap())
            .with_path("/attributes/on")
            .with_payload(json!(true))
            .with_header(keys::CORRELATION_ID, "c-out")
            .with_header(keys::REQUESTED_ACKS, requested)
            .with_header("priority", "low")
    }

    #[test]
    fn test_targets_sharing_a_mapper_list_form_one_group() {
        let mappings: Vec<Vec<String>> = vec![
            vec!["a".into()],
            vec!["a".into()],
            vec!["a".into(), "b".into()],
        ];
        let groups = group_targets(mappings, |m| (m.clone(), None));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].mapping, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_each_group_is_mapped_once_and_replicated() {
        let counting = CountingMapperFactory::default();
        let mut definitions = BTreeMap::new();
        definitions.insert("a".to_string(), definition("Counting", json!({})));
        definitions.insert("b".to_string(), definition("Counting", json!({})));
        let conn = connection(
            "conn-out",
            vec![],
            vec![
                target("one", &["a"], "conn-out:one"),
                target("two", &["a"], "conn-out:two"),
                target("three", &["a", "b"], "conn-out:three"),
            ],
            definitions,
        );
        let harness = OutboundHarness::new(
            conn.clone(),
            registry(&conn, vec![Arc::new(counting.clone())]),
        );

        let acks = harness
            .dispatcher
            .dispatch(&event("conn-out:one,conn-out:two,conn-out:three"))
            .await;

        assert_eq!(harness.mapping_metrics.snapshot().outbound_mapped, 3);
        assert_eq!(harness.publisher.published().len(), 4);
        assert_eq!(counting.invocations("a"), 2);
        assert_eq!(counting.invocations("b"), 1);

        assert_eq!(acks.len(), 3);
        assert!(acks.iter().all(|ack| ack.status == StatusCode::OK && !ack.weak));
        assert_eq!(acks.headers().correlation_id(), Some("c-out"));
    }

    #[tokio::test]
    async fn test_unrequested_labels_get_no_acknowledgement() {
        let conn = connection(
            "conn-out",
            vec![],
            vec![
                target("one", &[], "conn-out:one"),
                target("two", &[], "conn-out:two"),
            ],
            BTreeMap::new(),
        );
        let harness = OutboundHarness::new(conn.clone(), registry(&conn, vec![]));

        let acks = harness.dispatcher.dispatch(&event("conn-out:two")).await;

        assert_eq!(acks.len(), 1);
        assert!(acks.contains(&AckLabel::parse("conn-out:two").unwrap()));
        assert_eq!(harness.publisher.published().len(), 2);
    }

    // =========================================================================
    // PROPERTY: no requested target label is forgotten
    // =========================================================================

    #[derive(Debug, Clone, Copy)]
    enum Fate {
        Published,
        Filtered,
        PublishFails,
        Unaddressable,
    }

    fn fate() -> impl Strategy<Value = Fate> {
        prop_oneof![
            Just(Fate::Published),
            Just(Fate::Filtered),
            Just(Fate::PublishFails),
            Just(Fate::Unaddressable),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_every_requested_label_is_answered_once(
            fates in proptest::collection::vec((fate(), any::<bool>()), 1..6),
        ) {
            let targets: Vec<Target> = fates
                .iter()
                .enumerate()
                .map(|(i, (fate, explicit_mapper))| {
                    let mapping: &[&str] = if *explicit_mapper { &["Ditto"] } else { &[] };
                    let address = match fate {
                        Fate::Unaddressable => "{{ header:missing }}".to_string(),
                        _ => format!("out/{}", i),
                    };
                    let mut t = target(&address, mapping, &format!("conn-out:t{}", i));
                    if let Fate::Filtered = fate {
                        t.topics = vec![FilteredTopic::new(Topic::TwinEvents)
                            .with_filter(r#"eq(header:priority,"high")"#)];
                    }
                    t
                })
                .collect();
            let labels: Vec<String> = (0..targets.len()).map(|i| format!("conn-out:t{}", i)).collect();

            let conn = connection("conn-out", vec![], targets, BTreeMap::new());
            let harness = OutboundHarness::new(conn.clone(), registry(&conn, vec![]));
            for (i, (fate, _)) in fates.iter().enumerate() {
                if let Fate::PublishFails = fate {
                    let address = format!("out/{}", i);
                    harness.publisher.fail_on(
                        address.clone(),
                        PublishError::Transport { address, reason: "refused".into() },
                    );
                }
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let acks = runtime.block_on(harness.dispatcher.dispatch(&event(&labels.join(","))));

            prop_assert_eq!(acks.len(), labels.len());
            for (label, (fate, _)) in labels.iter().zip(&fates) {
                let ack = acks.get(&AckLabel::parse(label).unwrap()).unwrap();
                match fate {
                    Fate::Published => prop_assert!(ack.status == StatusCode::OK && !ack.weak),
                    Fate::Filtered | Fate::Unaddressable => prop_assert!(ack.weak),
                    Fate::PublishFails => prop_assert!(!ack.is_success()),
                }
            }
        }
    }
}
