//! # Shared Fixtures
//!
//! Connections, messages and custom mapper engines used by the scenario
//! tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use cg_01_mapping::mappers::DittoMapper;
use cg_01_mapping::{
    builtin_factories, InboundMappingStage, MapperContext, MapperFactory, MapperRegistry,
    MappingConfig, MappingError, MappingMetrics, MessageMapper, OutboundMappingStage,
    RegistryError,
};
use cg_02_acknowledgements::AcknowledgementsConfig;
use cg_03_dispatch::{
    DispatchMetrics, EnrichmentCache, EnrichmentConfig, InMemoryThingStore, OutboundDispatcher,
    RecordingPublisher,
};
use serde_json::{json, Value};
use shared_types::{
    Connection, ConnectionId, EntityId, ExternalMessage, Headers, MappingDefinition, Signal,
    Source, Target,
};

pub fn conn(id: &str) -> ConnectionId {
    ConnectionId::parse(id).unwrap()
}

pub fn thing(id: &str) -> EntityId {
    EntityId::parse(id).unwrap()
}

pub fn definition(engine: &str, options: Value) -> MappingDefinition {
    MappingDefinition {
        engine: engine.to_string(),
        options: options.as_object().cloned().unwrap_or_default(),
        ..Default::default()
    }
}

pub fn connection(
    id: &str,
    sources: Vec<Source>,
    targets: Vec<Target>,
    definitions: BTreeMap<String, MappingDefinition>,
) -> Arc<Connection> {
    Arc::new(Connection::new(conn(id), sources, targets, definitions).unwrap())
}

/// Protocol envelope text message bound to source 0 of `connection`.
pub fn protocol_message(connection: &Connection, headers: Headers, envelope: Value) -> ExternalMessage {
    ExternalMessage::builder(headers)
        .text(envelope.to_string())
        .source(connection.source(0).unwrap())
        .build()
}

pub fn modify_attribute(thing: &str, value: Value) -> Value {
    let (namespace, name) = thing.split_once(':').unwrap();
    json!({
        "topic": format!("{}/{}/things/twin/commands/modify", namespace, name),
        "path": "/attributes/value",
        "value": value
    })
}

// =============================================================================
// CUSTOM MAPPER ENGINES
// =============================================================================

/// Inbound: `device_id` header + JSON payload -> `modifyThing` on
/// `<namespace>:<device_id>`. Outbound: drops everything.
#[derive(Debug)]
pub struct DeviceMapper {
    id: String,
    namespace: String,
}

impl MessageMapper for DeviceMapper {
    fn id(&self) -> &str {
        &self.id
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        let Some(device) = message.headers().get("device_id") else {
            return Ok(Vec::new());
        };
        let text = message.payload().as_text().unwrap_or("{}");
        let payload: Value = serde_json::from_str(text).map_err(|e| MappingError::InvalidPayload(e.to_string()))?;
        let entity_id = EntityId::new(self.namespace.clone(), device)
            .map_err(|e| MappingError::protocol(None, e.to_string()))?;
        Ok(vec![Signal::command("modifyThing", entity_id)
            .with_headers(message.headers().clone())
            .with_payload(payload)])
    }

    fn map_outbound(&mut self, _signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct DeviceMapperFactory;

impl MapperFactory for DeviceMapperFactory {
    fn engine(&self) -> &'static str {
        "Device"
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        let namespace = context
            .option("namespace")
            .and_then(Value::as_str)
            .ok_or_else(|| context.invalid_options("'namespace' is required"))?;
        Ok(Box::new(DeviceMapper {
            id: context.id.clone(),
            namespace: namespace.to_string(),
        }))
    }
}

/// Protocol mapper counting outbound invocations per mapper id.
#[derive(Debug, Default, Clone)]
pub struct CountingMapperFactory {
    invocations: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingMapperFactory {
    pub fn invocations(&self, mapper_id: &str) -> usize {
        self.invocations
            .lock()
            .get(mapper_id)
            .copied()
            .unwrap_or(0)
    }
}

struct CountingMapper {
    inner: DittoMapper,
    invocations: Arc<Mutex<HashMap<String, usize>>>,
}

impl MessageMapper for CountingMapper {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        self.inner.map_inbound(message)
    }

    fn map_outbound(&mut self, signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        *self
            .invocations
            .lock()
            .entry(self.inner.id().to_string())
            .or_insert(0) += 1;
        self.inner.map_outbound(signal)
    }
}

impl MapperFactory for CountingMapperFactory {
    fn engine(&self) -> &'static str {
        "Counting"
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        Ok(Box::new(CountingMapper {
            inner: DittoMapper::new(context.id.clone()),
            invocations: self.invocations.clone(),
        }))
    }
}

/// Inbound mapper that stashes each `device_id` in instance state and also
/// writes it to a global every instance of the factory shares.
///
/// The emitted signal is built from the stash only; `stash-size` reports how
/// many messages this instance has seen.
#[derive(Debug, Default, Clone)]
pub struct StashingMapperFactory {
    created: Arc<AtomicUsize>,
    global: Arc<Mutex<Option<String>>>,
}

impl StashingMapperFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

struct StashingMapper {
    id: String,
    stash: Vec<String>,
    global: Arc<Mutex<Option<String>>>,
}

impl MessageMapper for StashingMapper {
    fn id(&self) -> &str {
        &self.id
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        let Some(device) = message.headers().get("device_id") else {
            return Ok(Vec::new());
        };
        self.stash.push(device.to_string());
        *self.global.lock() = Some(device.to_string());
        std::thread::yield_now();
        let last_global = self.global.lock().clone().unwrap_or_default();

        let stashed = self.stash.last().cloned().unwrap_or_default();
        let entity_id = EntityId::new("ns", stashed)
            .map_err(|e| MappingError::protocol(None, e.to_string()))?;
        Ok(vec![Signal::command("modifyThing", entity_id)
            .with_header("stash-size", self.stash.len().to_string())
            .with_header("last-global", last_global)])
    }

    fn map_outbound(&mut self, _signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        Ok(Vec::new())
    }
}

impl MapperFactory for StashingMapperFactory {
    fn engine(&self) -> &'static str {
        "Stashing"
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StashingMapper {
            id: context.id.clone(),
            stash: Vec::new(),
            global: self.global.clone(),
        }))
    }
}

pub fn registry(
    connection: &Connection,
    extra: Vec<Arc<dyn MapperFactory>>,
) -> Arc<MapperRegistry> {
    let mut factories = builtin_factories();
    factories.extend(extra);
    Arc::new(
        MapperRegistry::new(
            connection.id().clone(),
            connection.mapping_definitions(),
            factories,
        )
        .unwrap(),
    )
}

pub fn inbound_stage(registry: Arc<MapperRegistry>) -> InboundMappingStage {
    InboundMappingStage::new(
        registry,
        &MappingConfig::default(),
        Arc::new(MappingMetrics::new()),
    )
}

// =============================================================================
// OUTBOUND HARNESS
// =============================================================================

pub struct OutboundHarness {
    pub dispatcher: OutboundDispatcher,
    pub publisher: Arc<RecordingPublisher>,
    pub things: Arc<InMemoryThingStore>,
    pub mapping_metrics: Arc<MappingMetrics>,
    pub metrics: Arc<DispatchMetrics>,
}

impl OutboundHarness {
    pub fn new(connection: Arc<Connection>, registry: Arc<MapperRegistry>) -> Self {
        let mapping_metrics = Arc::new(MappingMetrics::new());
        let metrics = Arc::new(DispatchMetrics::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let things = Arc::new(InMemoryThingStore::new());
        let mapping = Arc::new(OutboundMappingStage::new(
            registry,
            &MappingConfig::default(),
            mapping_metrics.clone(),
        ));
        let enrichment = Arc::new(EnrichmentCache::new(
            things.clone(),
            &EnrichmentConfig::default(),
            metrics.clone(),
        ));
        let dispatcher = OutboundDispatcher::new(
            connection,
            mapping,
            publisher.clone(),
            enrichment,
            AcknowledgementsConfig::default(),
            metrics.clone(),
        );
        Self {
            dispatcher,
            publisher,
            things,
            mapping_metrics,
            metrics,
        }
    }
}
