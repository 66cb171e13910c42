//! Transport stand-ins used when the gateway runs without real transports.

use async_trait::async_trait;
use cg_03_dispatch::{Destination, PublishError, Publisher};
use shared_types::{ConnectionId, ExternalMessage, Signal};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::info;

/// Publisher that logs each outbound message.
#[derive(Debug)]
pub struct LoggingPublisher {
    connection_id: ConnectionId,
    published: AtomicU64,
}

impl LoggingPublisher {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            published: AtomicU64::new(0),
        }
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(
        &self,
        message: ExternalMessage,
        destination: &Destination,
    ) -> Result<(), PublishError> {
        self.published.fetch_add(1, Ordering::Relaxed);
        info!(
            connection = %self.connection_id,
            address = %destination.address(),
            correlation_id = ?message.headers().correlation_id(),
            bytes = message.payload().as_text().map_or(0, str::len),
            "Published"
        );
        Ok(())
    }
}

/// Log signals handed to command routing until the channel closes.
pub async fn log_forwarded(connection_id: ConnectionId, mut forwarded: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = forwarded.recv().await {
        info!(
            connection = %connection_id,
            signal = %signal.name(),
            entity = %signal.entity_id(),
            correlation_id = ?signal.correlation_id(),
            "Forwarded to command routing"
        );
    }
}
