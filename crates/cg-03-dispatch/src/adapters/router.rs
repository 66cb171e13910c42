//! Command router backed by an unbounded channel.
//!
//! The receiving half belongs to whatever executes commands; responses come
//! back through `ResponseRouter::handle`.

use crate::ports::CommandRouter;
use async_trait::async_trait;
use shared_types::Signal;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ChannelCommandRouter {
    sender: mpsc::UnboundedSender<Signal>,
}

impl ChannelCommandRouter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl CommandRouter for ChannelCommandRouter {
    async fn forward(&self, signal: Signal) {
        if let Err(e) = self.sender.send(signal) {
            warn!(
                correlation_id = ?e.0.correlation_id(),
                signal = %e.0.name(),
                "Command router is closed, dropping signal"
            );
        }
    }
}
