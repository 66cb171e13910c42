//! In-memory publisher.
//!
//! Records every published message. Addresses registered with `fail_on`
//! reject publishes, which lets callers exercise per-target failure paths.

use crate::error::PublishError;
use crate::ports::{Destination, Publisher};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::ExternalMessage;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(ExternalMessage, Destination)>>,
    failures: Mutex<HashMap<String, PublishError>>,
    delay: Option<Duration>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every publish by `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every publish to `address` with `error`.
    pub fn fail_on(&self, address: impl Into<String>, error: PublishError) {
        self.failures.lock().insert(address.into(), error);
    }

    pub fn published(&self) -> Vec<(ExternalMessage, Destination)> {
        self.published.lock().clone()
    }

    /// Addresses in publish order.
    pub fn addresses(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, d)| d.address().to_string())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        message: ExternalMessage,
        destination: &Destination,
    ) -> Result<(), PublishError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.lock().get(destination.address()).cloned() {
            return Err(error);
        }
        debug!(address = %destination.address(), "Recorded publish");
        self.published.lock().push((message, destination.clone()));
        Ok(())
    }
}
