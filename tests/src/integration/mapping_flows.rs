//! # Inbound Mapping Flows
//!
//! One external message through the mapper chain of its source:
//!
//! ```text
//! ExternalMessage ──→ [blocklist] ──→ [incoming conditions] ──→ mapper ──→ outcome
//!                         │                    │
//!                         └──── skipped ───────┘   (no outcome, counted)
//! ```

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use cg_01_mapping::{InboundMappingStage, MappingConfig, MappingMetrics, MappingOutcome, OutcomeCounts};
    use proptest::prelude::*;
    use serde_json::json;
    use shared_types::{keys, ExternalMessage, Headers, MappingDefinition, Signal, Source};

    use crate::integration::fixtures::{
        connection, definition, inbound_stage, modify_attribute, protocol_message, registry,
        DeviceMapperFactory, StashingMapperFactory,
    };

    fn mapped_signals(outcomes: &[MappingOutcome<Vec<Signal>>]) -> Vec<Signal> {
        outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                MappingOutcome::Mapped { mapped, .. } => Some(mapped.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_device_header_becomes_modify_command() {
        let mut definitions = BTreeMap::new();
        definitions.insert("device".to_string(), definition("Device", json!({"namespace": "ns"})));
        let conn = connection(
            "conn-in",
            vec![Source {
                addresses: vec!["devices/#".into()],
                payload_mapping: vec!["device".into()],
                ..Default::default()
            }],
            vec![],
            definitions,
        );
        let stage = inbound_stage(registry(&conn, vec![Arc::new(DeviceMapperFactory)]));

        let headers: Headers = [("device_id", "thing-1")].into_iter().collect();
        let message = ExternalMessage::builder(headers)
            .text(json!({"temperature": 21}).to_string())
            .source(conn.source(0).unwrap())
            .build();

        let outcomes = stage.process(&message);

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            MappingOutcome::Mapped { mapper_id, mapped } => {
                assert_eq!(mapper_id, "device");
                assert_eq!(mapped.len(), 1);
                assert_eq!(mapped[0].name(), "modifyThing");
                assert_eq!(mapped[0].entity_id().to_string(), "ns:thing-1");
                assert_eq!(mapped[0].payload(), Some(&json!({"temperature": 21})));
                assert_eq!(
                    mapped[0].headers().get(keys::INBOUND_PAYLOAD_MAPPER),
                    Some("device")
                );
            }
            other => panic!("expected mapped outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_message_without_device_header_is_dropped() {
        let mut definitions = BTreeMap::new();
        definitions.insert("device".to_string(), definition("Device", json!({"namespace": "ns"})));
        let conn = connection(
            "conn-in",
            vec![Source {
                payload_mapping: vec!["device".into()],
                ..Default::default()
            }],
            vec![],
            definitions,
        );
        let stage = inbound_stage(registry(&conn, vec![Arc::new(DeviceMapperFactory)]));
        let message = ExternalMessage::builder(Headers::new())
            .text("{}")
            .source(conn.source(0).unwrap())
            .build();

        let outcomes = stage.process(&message);
        let counts = OutcomeCounts::of(&outcomes);
        assert_eq!((counts.mapped, counts.dropped, counts.errors), (0, 1, 0));
    }

    #[test]
    fn test_mapping_the_same_message_twice_is_identical() {
        let conn = connection("conn-in", vec![Source::default()], vec![], BTreeMap::new());
        let stage = inbound_stage(registry(&conn, vec![]));
        let headers: Headers = [(keys::CORRELATION_ID, "c-1")].into_iter().collect();
        let message = protocol_message(&conn, headers, modify_attribute("ns:lamp", json!(42)));

        let first = mapped_signals(&stage.process(&message));
        let second = mapped_signals(&stage.process(&message));

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_runs_never_share_mapper_state() {
        const MESSAGES: usize = 64;

        let stashing = StashingMapperFactory::default();
        let mut definitions = BTreeMap::new();
        definitions.insert("stash".to_string(), definition("Stashing", json!({})));
        let conn = connection(
            "conn-in",
            vec![Source {
                payload_mapping: vec!["stash".into()],
                ..Default::default()
            }],
            vec![],
            definitions,
        );
        let stage = inbound_stage(registry(&conn, vec![Arc::new(stashing.clone())]));

        let results: Vec<(String, Vec<MappingOutcome<Vec<Signal>>>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..MESSAGES)
                .map(|i| {
                    let stage = &stage;
                    let conn = &conn;
                    scope.spawn(move || {
                        let device = format!("device-{}", i);
                        let headers: Headers = [("device_id", device.as_str())].into_iter().collect();
                        let message = ExternalMessage::builder(headers)
                            .text("{}")
                            .source(conn.source(0).unwrap())
                            .build();
                        (device, stage.process(&message))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(stashing.created(), MESSAGES);
        for (device, outcomes) in &results {
            let signals = mapped_signals(outcomes);
            assert_eq!(signals.len(), 1, "outcomes for {}: {:?}", device, outcomes);
            assert_eq!(signals[0].entity_id().to_string(), format!("ns:{}", device));
            assert_eq!(signals[0].headers().get("stash-size"), Some("1"));
        }
    }

    // =========================================================================
    // PROPERTY: one outcome per mapper that was not skipped
    // =========================================================================

    const MAPPERS: [&str; 4] = ["plain", "blocked", "gated", "Ditto"];

    fn property_stage() -> (InboundMappingStage, Arc<MappingMetrics>, Arc<shared_types::Connection>) {
        let mut definitions = BTreeMap::new();
        definitions.insert("plain".to_string(), definition("Ditto", json!({})));
        definitions.insert(
            "blocked".to_string(),
            MappingDefinition {
                content_type_blocklist: vec!["application/octet-stream".into()],
                ..definition("Ditto", json!({}))
            },
        );
        let mut gated = definition("Ditto", json!({}));
        gated
            .incoming_conditions
            .insert("flag-on".into(), r#"eq(header:flag,"on")"#.into());
        definitions.insert("gated".to_string(), gated);

        let conn = connection("conn-in", vec![Source::default()], vec![], definitions);
        let metrics = Arc::new(MappingMetrics::new());
        let stage = InboundMappingStage::new(
            registry(&conn, vec![]),
            &MappingConfig::default(),
            metrics.clone(),
        );
        (stage, metrics, conn)
    }

    proptest! {
        #[test]
        fn test_outcome_count_is_mappers_minus_skipped(
            picks in proptest::collection::vec(0..MAPPERS.len(), 0..6),
            octet_stream in any::<bool>(),
            flag_on in any::<bool>(),
            valid_payload in any::<bool>(),
        ) {
            let (stage, metrics, conn) = property_stage();
            let names: Vec<String> = picks.iter().map(|&i| MAPPERS[i].to_string()).collect();

            let mut headers = Headers::new();
            headers.insert(
                keys::CONTENT_TYPE,
                if octet_stream { "application/octet-stream" } else { "application/json" },
            );
            if flag_on {
                headers.insert("flag", "on");
            }
            let text = if valid_payload {
                modify_attribute("ns:lamp", json!(1)).to_string()
            } else {
                "not json".to_string()
            };
            let message = ExternalMessage::builder(headers)
                .text(text)
                .source(conn.source(0).unwrap())
                .payload_mapping(names.clone())
                .build();

            let effective = if names.is_empty() { vec!["Ditto".to_string()] } else { names };
            let skipped = effective
                .iter()
                .filter(|name| {
                    (name.as_str() == "blocked" && octet_stream) || (name.as_str() == "gated" && !flag_on)
                })
                .count();

            let outcomes = stage.process(&message);

            prop_assert!(outcomes.len() <= effective.len());
            prop_assert_eq!(outcomes.len(), effective.len() - skipped);
            prop_assert_eq!(OutcomeCounts::of(&outcomes).total(), outcomes.len());
            prop_assert_eq!(metrics.snapshot().skipped, skipped as u64);
        }
    }
}
