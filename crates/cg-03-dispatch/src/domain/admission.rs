//! # Inbound Admission
//!
//! Decides whether a mapped signal may enter the gateway and which of its
//! requested acknowledgements stay active.
//!
//! Rules, in order:
//! 1. source enforcement must match (403 otherwise)
//! 2. gateway headers must parse (400 otherwise)
//! 3. inbound acknowledgements must carry a declared label (400 otherwise)
//! 4. active requests = requested ∩ declared by the admitting source
//! 5. a false source acknowledgement filter clears all requests
//! 6. queries never request acknowledgements

use crate::error::DispatchError;
use cg_01_mapping::{Expression, PlaceholderContext};
use shared_types::{
    keys, AckLabel, Connection, Enforcement, ExternalMessage, Signal, SignalKind,
};
use tracing::debug;

/// A signal that passed admission, with rewritten headers.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittedSignal {
    pub signal: Signal,
    /// Whether the sender waits for a response or acknowledgements.
    pub awaits_response: bool,
}

pub fn admit(
    signal: Signal,
    message: &ExternalMessage,
    connection: &Connection,
    correlation_id: &str,
) -> Result<AdmittedSignal, DispatchError> {
    if let Some(enforcement) = message.enforcement() {
        check_enforcement(enforcement, message, &signal, connection)?;
    }

    let requested = signal.requested_acks()?;
    let explicit_response_required = signal.headers().response_required()?;
    signal.headers().timeout()?;
    signal.headers().channel()?;

    check_declared_labels(&signal, connection)?;

    let declared = message.declared_acks();
    let mut active: Vec<AckLabel> = requested
        .into_iter()
        .filter(|label| declared.contains(label))
        .collect();

    if !active.is_empty() {
        if let Some(filter) = message
            .source()
            .and_then(|b| b.source.acknowledgement_filter.as_deref())
        {
            let expression = Expression::parse(filter)?;
            let ctx = PlaceholderContext::new()
                .with_headers(message.headers())
                .with_signal(&signal)
                .with_auth_context(message.auth_context())
                .with_connection(connection.id());
            if !expression.evaluate(&ctx)? {
                debug!(
                    correlation_id = %correlation_id,
                    filter = %filter,
                    "Acknowledgement filter false, clearing requested acknowledgements"
                );
                active.clear();
            }
        }
    }
    if signal.is_query() {
        active.clear();
    }

    let reply_target = message
        .source()
        .filter(|b| b.source.reply_target.is_some())
        .map(|b| b.index);
    let response_required = explicit_response_required.unwrap_or(reply_target.is_some());

    let mut headers = signal
        .headers()
        .with_requested_acks(&active)
        .with(keys::CORRELATION_ID, correlation_id);
    if signal.expects_response() {
        headers.insert(keys::RESPONSE_REQUIRED, response_required.to_string());
    }
    if let Some(index) = reply_target {
        headers.insert(keys::REPLY_TARGET, index.to_string());
    }

    let awaits_response = signal.expects_response() && (response_required || !active.is_empty());
    Ok(AdmittedSignal {
        signal: signal.with_headers(headers),
        awaits_response,
    })
}

fn check_enforcement(
    enforcement: &Enforcement,
    message: &ExternalMessage,
    signal: &Signal,
    connection: &Connection,
) -> Result<(), DispatchError> {
    let input = PlaceholderContext::new()
        .with_headers(message.headers())
        .with_auth_context(message.auth_context())
        .with_connection(connection.id())
        .resolve_template(&enforcement.input)?;

    let filter_ctx = PlaceholderContext::new()
        .with_signal(signal)
        .with_connection(connection.id());
    let matched = enforcement.filters.iter().any(|filter| {
        filter_ctx
            .resolve_template(filter)
            .is_ok_and(|resolved| resolved == input)
    });
    if matched {
        Ok(())
    } else {
        Err(DispatchError::EnforcementFailed { input })
    }
}

fn check_declared_labels(signal: &Signal, connection: &Connection) -> Result<(), DispatchError> {
    let undeclared = match signal.kind() {
        SignalKind::Acknowledgement { label, .. } => {
            Some(label).filter(|label| !connection.declares(label))
        }
        SignalKind::Acknowledgements { acks, .. } => acks
            .iter()
            .map(|ack| &ack.label)
            .find(|label| !connection.declares(label)),
        _ => None,
    };
    match undeclared {
        Some(label) => Err(DispatchError::UndeclaredLabel(label.clone())),
        None => Ok(()),
    }
}
