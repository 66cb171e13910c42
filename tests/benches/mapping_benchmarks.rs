//! # Connectivity Gateway Mapping Benchmarks
//!
//! | Path     | Measured                                          |
//! |----------|---------------------------------------------------|
//! | inbound  | protocol envelope → signal, per mapper chain size |
//! | outbound | one signal to N targets sharing one mapper group  |
//! | grouping | target grouping by mapper list                    |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cg_01_mapping::{
    group_targets, InboundMappingStage, MapperRegistry, MappingConfig, MappingMetrics,
    OutboundMappingStage,
};
use cg_02_acknowledgements::AcknowledgementsConfig;
use cg_03_dispatch::{
    DispatchMetrics, EnrichmentCache, EnrichmentConfig, InMemoryThingStore, OutboundDispatcher,
    RecordingPublisher,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use shared_types::{
    keys, Connection, ConnectionId, EntityId, ExternalMessage, FilteredTopic, Headers, Signal,
    Source, Target, Topic,
};

fn connection(targets: Vec<Target>) -> Arc<Connection> {
    Arc::new(
        Connection::new(
            ConnectionId::parse("bench").unwrap(),
            vec![Source::default()],
            targets,
            BTreeMap::new(),
        )
        .unwrap(),
    )
}

// ============================================================================
// INBOUND
// ============================================================================

fn bench_inbound_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("cg-01-inbound-mapping");
    group.measurement_time(Duration::from_secs(5));

    let conn = connection(vec![]);
    let registry = Arc::new(MapperRegistry::for_connection(&conn).unwrap());
    let stage = InboundMappingStage::new(
        registry,
        &MappingConfig::default(),
        Arc::new(MappingMetrics::new()),
    );
    let envelope = json!({
        "topic": "ns/lamp/things/twin/commands/modify",
        "path": "/attributes/brightness",
        "value": 80
    })
    .to_string();

    for chain in [1usize, 2, 4, 8] {
        let message = ExternalMessage::builder(
            [(keys::CORRELATION_ID, "bench")].into_iter().collect::<Headers>(),
        )
        .text(envelope.clone())
        .source(conn.source(0).unwrap())
        .payload_mapping(vec!["Ditto".to_string(); chain])
        .build();

        group.throughput(Throughput::Elements(chain as u64));
        group.bench_with_input(BenchmarkId::new("ditto_chain", chain), &message, |b, message| {
            b.iter(|| black_box(stage.process(message)))
        });
    }

    group.finish();
}

// ============================================================================
// OUTBOUND
// ============================================================================

fn bench_outbound_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("cg-03-outbound-dispatch");
    group.measurement_time(Duration::from_secs(5));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    for targets in [1usize, 10, 50] {
        let conn = connection(
            (0..targets)
                .map(|i| Target {
                    address: format!("out/{}/{{{{ thing:name }}}}", i),
                    topics: vec![FilteredTopic::new(Topic::TwinEvents)],
                    ..Default::default()
                })
                .collect(),
        );
        let registry = Arc::new(MapperRegistry::for_connection(&conn).unwrap());
        let metrics = Arc::new(DispatchMetrics::new());
        let dispatcher = OutboundDispatcher::new(
            conn,
            Arc::new(OutboundMappingStage::new(
                registry,
                &MappingConfig::default(),
                Arc::new(MappingMetrics::new()),
            )),
            Arc::new(RecordingPublisher::new()),
            Arc::new(EnrichmentCache::new(
                Arc::new(InMemoryThingStore::new()),
                &EnrichmentConfig::default(),
                metrics.clone(),
            )),
            AcknowledgementsConfig::default(),
            metrics,
        );
        let signal = Signal::event("attributeModified", EntityId::parse("ns:lamp").unwrap())
            .with_path("/attributes/brightness")
            .with_payload(json!(80));

        group.throughput(Throughput::Elements(targets as u64));
        group.bench_with_input(BenchmarkId::new("one_group", targets), &signal, |b, signal| {
            b.iter(|| runtime.block_on(dispatcher.dispatch(black_box(signal))))
        });
    }

    group.finish();
}

fn bench_target_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("cg-01-target-grouping");

    for targets in [10usize, 100, 1000] {
        let mappings: Vec<Vec<String>> = (0..targets)
            .map(|i| vec![format!("mapper-{}", i % 7)])
            .collect();

        group.throughput(Throughput::Elements(targets as u64));
        group.bench_with_input(BenchmarkId::new("by_mapper_list", targets), &mappings, |b, mappings| {
            b.iter(|| black_box(group_targets(mappings.iter(), |m| ((*m).clone(), None))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_inbound_mapping,
    bench_outbound_dispatch,
    bench_target_grouping
);
criterion_main!(benches);
