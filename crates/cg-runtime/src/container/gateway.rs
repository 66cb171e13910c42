//! # Gateway Container
//!
//! Holds the diversion bus and every started connection.

use crate::container::GatewayConfig;
use crate::wiring::{ConnectionPorts, ConnectionRuntime};
use anyhow::{Context, Result};
use shared_bus::InMemoryDiversionBus;
use shared_types::{Connection, ConnectionId};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct GatewayContainer {
    pub config: GatewayConfig,
    bus: Arc<InMemoryDiversionBus>,
    connections: BTreeMap<ConnectionId, Arc<ConnectionRuntime>>,
}

impl GatewayContainer {
    /// Start every configured connection with the ports `ports_for` supplies.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new<F>(config: GatewayConfig, mut ports_for: F) -> Result<Self>
    where
        F: FnMut(&Connection) -> ConnectionPorts,
    {
        config.validate().context("Invalid gateway configuration")?;
        let bus = Arc::new(InMemoryDiversionBus::with_capacity(
            config.diversion.channel_capacity,
        ));

        let mut connections = BTreeMap::new();
        for connection_config in &config.connections {
            let connection = connection_config.build()?;
            let ports = ports_for(&connection);
            let runtime = ConnectionRuntime::start(connection, &config, ports, bus.clone())
                .with_context(|| format!("Failed to start connection '{}'", connection_config.id))?;
            connections.insert(connection_config.id.clone(), Arc::new(runtime));
        }

        Ok(Self {
            config,
            bus,
            connections,
        })
    }

    pub fn bus(&self) -> &Arc<InMemoryDiversionBus> {
        &self.bus
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Arc<ConnectionRuntime>> {
        self.connections.get(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Arc<ConnectionRuntime>> {
        self.connections.values()
    }
}
