//! # Connectivity Gateway Runtime
//!
//! Wires the processing core for every configured connection and runs the
//! background tasks each connection needs.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the set of running connections
//! - `wiring/` - per-connection pipeline and diverted-response reception
//! - `adapters/` - port implementations for running without transports
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, `CG_CONFIG` file, environment)
//! 2. Validate it
//! 3. Start one pipeline and worker pool per connection
//! 4. Spawn per-connection collector cleanup and diversion subscription
//! 5. Signal ready
//!
//! ## Background Tasks per Connection
//!
//! ```text
//! cleanup_task ──────────────→ settles expired response collectors
//! receive_diverted_responses ─→ diversion bus → outbound path
//! ```

pub mod adapters;
pub mod container;
pub mod wiring;

use std::sync::Arc;

use anyhow::Result;
use cg_02_acknowledgements::cleanup_task;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use crate::container::{load_config, ConfigError, ConnectionConfig, GatewayConfig, GatewayContainer};
pub use crate::wiring::{ConnectionPorts, ConnectionRuntime};

/// The gateway runtime orchestrating all connections.
pub struct GatewayRuntime {
    /// Connections and the diversion bus.
    container: Arc<GatewayContainer>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GatewayRuntime {
    pub fn new(container: GatewayContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the background tasks of every connection.
    pub fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Connectivity Gateway Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let interval = self.container.config.acknowledgements.cleanup_interval;
        let mut tasks = self.tasks.lock();

        for connection in self.container.connections() {
            let id = connection.id().clone();

            let collectors = Arc::clone(connection.collectors());
            let mut cleanup_shutdown = self.shutdown_rx.clone();
            let cleanup_id = id.clone();
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = cleanup_task(collectors, interval) => {}
                    _ = cleanup_shutdown.changed() => {
                        info!(connection = %cleanup_id, "Collector cleanup stopped");
                    }
                }
            }));

            let subscription = self.container.bus().subscribe_for_diverted_responses(id.clone());
            let receiver = Arc::clone(connection);
            let mut diversion_shutdown = self.shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                tokio::select! {
                    _ = wiring::receive_diverted_responses(subscription, receiver) => {}
                    _ = diversion_shutdown.changed() => {
                        info!(connection = %id, "Diverted-response reception stopped");
                    }
                }
            }));
        }

        info!(
            connections = self.container.connections().count(),
            "Gateway runtime started"
        );
        Ok(())
    }

    /// Shutdown the gateway gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal shutdown to background tasks
    /// 2. Wait for them to stop
    /// 3. Drain every connection's worker queues
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task terminated abnormally");
            }
        }

        for connection in self.container.connections() {
            connection.shutdown().await;
        }

        info!("Shutdown complete");
    }

    /// Get a reference to the gateway container.
    pub fn container(&self) -> Arc<GatewayContainer> {
        Arc::clone(&self.container)
    }
}
