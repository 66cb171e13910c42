//! # Connectivity Gateway
//!
//! Binary entry point. Without transport adapters attached, outbound
//! publishes and routed commands are logged.

use std::sync::Arc;

use anyhow::{Context, Result};
use cg_03_dispatch::{ChannelCommandRouter, InMemoryThingStore};
use cg_runtime::adapters::{log_forwarded, LoggingPublisher};
use cg_runtime::{load_config, ConnectionPorts, GatewayContainer, GatewayRuntime};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log filter, e.g. `debug` or `cg_03_dispatch=debug,info`.
const LOG_LEVEL_VAR: &str = "CG_LOG_LEVEL";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_env(LOG_LEVEL_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = load_config().context("Failed to load configuration")?;

    let things = Arc::new(InMemoryThingStore::new());
    let container = GatewayContainer::new(config, |connection| {
        let (router, forwarded) = ChannelCommandRouter::new();
        tokio::spawn(log_forwarded(connection.id().clone(), forwarded));
        ConnectionPorts {
            publisher: Arc::new(LoggingPublisher::new(connection.id().clone())),
            router: Arc::new(router),
            enrichment: things.clone(),
        }
    })?;

    let runtime = GatewayRuntime::new(container);
    runtime.start()?;

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
