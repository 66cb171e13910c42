//! Terminal output of a response collector.

use shared_types::Signal;

/// What a collector had gathered when it settled.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutput {
    /// `false` when the deadline fired before the expected count was reached.
    pub all_arrived: bool,
    /// Responses in arrival order.
    pub responses: Vec<Signal>,
}

impl CollectorOutput {
    pub fn settled_empty() -> Self {
        Self {
            all_arrived: true,
            responses: Vec::new(),
        }
    }

    /// Responses that count as failures.
    ///
    /// A live response with a non-timeout status is the device's answer and
    /// does not count.
    pub fn failed_responses(&self) -> Vec<&Signal> {
        self.responses.iter().filter(|s| s.is_failed()).collect()
    }

    pub fn successful_responses(&self) -> Vec<&Signal> {
        self.responses.iter().filter(|s| !s.is_failed()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.all_arrived && self.responses.iter().all(|s| !s.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Channel, EntityId, StatusCode};

    #[test]
    fn test_live_error_is_not_failed() {
        let thing = EntityId::parse("ns:t").unwrap();
        let output = CollectorOutput {
            all_arrived: true,
            responses: vec![
                Signal::response("sendMessage", thing.clone(), StatusCode::BAD_REQUEST)
                    .with_channel(Channel::Live),
                Signal::response("modifyThing", thing, StatusCode::FORBIDDEN),
            ],
        };
        assert_eq!(output.failed_responses().len(), 1);
        assert_eq!(output.successful_responses().len(), 1);
        assert!(!output.is_success());
    }
}
