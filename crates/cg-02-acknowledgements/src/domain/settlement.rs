//! Transport settlement of an inbound message, decided by its collector
//! output.

use crate::domain::output::CollectorOutput;
use shared_types::Settlement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDecision {
    Ack,
    Reject { redeliver: bool },
}

impl SettlementDecision {
    /// - all arrived, none failed: ack
    /// - deadline fired: reject and redeliver
    /// - a failure worth retrying (408, 424, 5xx): reject and redeliver
    /// - any other failure: reject without redelivery
    pub fn from_output(output: &CollectorOutput) -> Self {
        if !output.all_arrived {
            return SettlementDecision::Reject { redeliver: true };
        }
        let failed = output.failed_responses();
        if failed.is_empty() {
            return SettlementDecision::Ack;
        }
        let redeliver = failed
            .iter()
            .filter_map(|s| s.status())
            .any(|status| status.is_retryable());
        SettlementDecision::Reject { redeliver }
    }

    pub fn apply(&self, settlement: &dyn Settlement) {
        match self {
            SettlementDecision::Ack => settlement.ack(),
            SettlementDecision::Reject { redeliver } => settlement.reject(*redeliver),
        }
    }
}
