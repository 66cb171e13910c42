//! # Acknowledgement Aggregator
//!
//! Collects the acknowledgements requested by one signal and turns them into
//! the terminal [`Acknowledgements`] aggregate. Labels that never arrived are
//! reported as `408` timeouts so the requester always sees every label.

use shared_types::{
    AckLabel, Acknowledgement, Acknowledgements, Channel, EntityId, HeaderError, Headers, Signal,
    SignalKind,
};

#[derive(Debug, Clone)]
pub struct AcknowledgementAggregator {
    entity_id: EntityId,
    headers: Headers,
    expected: Vec<AckLabel>,
    received: Acknowledgements,
}

impl AcknowledgementAggregator {
    pub fn new(entity_id: EntityId, expected: Vec<AckLabel>, headers: Headers) -> Self {
        let mut unique = Vec::with_capacity(expected.len());
        for label in expected {
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        Self {
            received: Acknowledgements::empty(entity_id.clone(), headers.clone()),
            entity_id,
            headers,
            expected: unique,
        }
    }

    /// Aggregator for the acknowledgements `signal` requests.
    pub fn for_signal(signal: &Signal) -> Result<Self, HeaderError> {
        Ok(Self::new(
            signal.entity_id().clone(),
            signal.requested_acks()?,
            signal.headers().clone(),
        ))
    }

    pub fn expected(&self) -> &[AckLabel] {
        &self.expected
    }

    pub fn expects(&self, label: &AckLabel) -> bool {
        self.expected.contains(label)
    }

    /// Add one acknowledgement. Unrequested labels are ignored.
    ///
    /// A weak acknowledgement never replaces one that already arrived.
    pub fn add(&mut self, ack: Acknowledgement) -> bool {
        if !self.expects(&ack.label) {
            return false;
        }
        if ack.weak && self.received.contains(&ack.label) {
            return false;
        }
        self.received.push(ack);
        true
    }

    /// Add whatever acknowledgements `signal` carries.
    ///
    /// Command responses count for `twin-persisted` (twin channel) or
    /// `live-response` (live channel). Returns how many were accepted.
    pub fn add_signal(&mut self, signal: &Signal) -> usize {
        match signal.kind() {
            SignalKind::Acknowledgement { .. } => {
                Acknowledgement::from_signal(signal).map_or(0, |ack| usize::from(self.add(ack)))
            }
            SignalKind::Acknowledgements { acks, .. } => {
                acks.iter().filter(|ack| self.add((*ack).clone())).count()
            }
            SignalKind::Response { status, .. } => {
                let label = match signal.channel() {
                    Channel::Twin => AckLabel::twin_persisted(),
                    Channel::Live => AckLabel::live_response(),
                };
                let mut ack = Acknowledgement::new(
                    label,
                    signal.entity_id().clone(),
                    *status,
                    signal.headers().clone(),
                );
                ack.payload = signal.payload().cloned();
                usize::from(self.add(ack))
            }
            _ => 0,
        }
    }

    pub fn received_all(&self) -> bool {
        self.expected.iter().all(|l| self.received.contains(l))
    }

    pub fn missing(&self) -> Vec<&AckLabel> {
        self.expected
            .iter()
            .filter(|l| !self.received.contains(l))
            .collect()
    }

    /// The aggregate, with a timeout acknowledgement for each missing label.
    pub fn build(self) -> Acknowledgements {
        let mut aggregate = self.received;
        for label in &self.expected {
            if !aggregate.contains(label) {
                aggregate.push(Acknowledgement::timeout(
                    label.clone(),
                    self.entity_id.clone(),
                    self.headers.clone(),
                ));
            }
        }
        aggregate
    }
}
