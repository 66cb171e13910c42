//! # Response Routing
//!
//! Where a response coming back from command routing goes:
//!
//! 1. into the collector of the inbound message it answers, if still pending
//! 2. to another connection, if the command asked for diversion
//! 3. otherwise to the reply target of the originating source

use crate::service::diversion::ResponseDiversionInterceptor;
use crate::service::replies::ReplyTargetPublisher;
use cg_02_acknowledgements::ResponseCollectorStore;
use shared_types::Signal;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRoute {
    Diverted,
    Replied,
    /// Neither diverted nor published; the collector may still have it.
    Unrouted,
}

pub struct ResponseRouter {
    collectors: Arc<ResponseCollectorStore>,
    diversion: Arc<ResponseDiversionInterceptor>,
    replies: Arc<ReplyTargetPublisher>,
}

impl ResponseRouter {
    pub fn new(
        collectors: Arc<ResponseCollectorStore>,
        diversion: Arc<ResponseDiversionInterceptor>,
        replies: Arc<ReplyTargetPublisher>,
    ) -> Self {
        Self {
            collectors,
            diversion,
            replies,
        }
    }

    pub async fn handle(&self, response: Signal) -> ResponseRoute {
        if let Some(id) = response.correlation_id() {
            if self.collectors.is_pending(id) {
                // settled concurrently: the collector already has its output
                let _ = self.collectors.deliver(id, response.clone());
            }
        }

        if self.diversion.intercept_and_divert(&response).await {
            return ResponseRoute::Diverted;
        }
        if self.replies.publish_response(&response).await {
            return ResponseRoute::Replied;
        }
        debug!(
            correlation_id = ?response.correlation_id(),
            signal = %response.name(),
            "Response has no reply target"
        );
        ResponseRoute::Unrouted
    }
}
