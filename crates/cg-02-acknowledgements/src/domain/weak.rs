//! Weak acknowledgements for targets that will never publish a signal.

use shared_types::{AckLabel, Acknowledgement, Signal};
use tracing::debug;

/// Weak acknowledgements for the issued labels of targets that did not
/// publish `signal`.
///
/// Only labels the signal actually requests are answered. `live-response`
/// is never synthesized: only the device can answer it.
pub fn weak_acknowledgements<'a>(
    signal: &Signal,
    issued_labels: impl IntoIterator<Item = &'a AckLabel>,
    reason: &str,
) -> Vec<Acknowledgement> {
    let requested = signal.requested_acks().unwrap_or_default();
    if requested.is_empty() {
        return Vec::new();
    }

    let mut weak: Vec<Acknowledgement> = Vec::new();
    for label in issued_labels {
        if label.is_live_response() || !requested.contains(label) {
            continue;
        }
        if weak.iter().any(|a| &a.label == label) {
            continue;
        }
        debug!(
            correlation_id = ?signal.correlation_id(),
            label = %label,
            reason = reason,
            "Synthesizing weak acknowledgement"
        );
        weak.push(Acknowledgement::weak(
            label.clone(),
            signal.entity_id().clone(),
            signal.headers().clone(),
            reason,
        ));
    }
    weak
}
