//! # Acknowledgements
//!
//! Acknowledgement labels, single acknowledgements and their aggregate.
//!
//! A label is either *declared* by a source (labels the source may satisfy)
//! or *issued* by a target (the label a successful publish satisfies).

use crate::errors::LabelError;
use crate::headers::Headers;
use crate::ids::{ConnectionId, EntityId};
use crate::signal::{Signal, SignalKind};
use crate::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Placeholder usable inside declared labels.
pub const CONNECTION_ID_PLACEHOLDER: &str = "{{connection:id}}";

// =============================================================================
// LABEL
// =============================================================================

/// Acknowledgement label: 3..=165 characters of `[A-Za-z0-9-_:.{}]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AckLabel(String);

impl AckLabel {
    pub const TWIN_PERSISTED: &'static str = "twin-persisted";
    pub const LIVE_RESPONSE: &'static str = "live-response";
    pub const SEARCH_PERSISTED: &'static str = "search-persisted";

    pub fn parse(s: &str) -> Result<Self, LabelError> {
        let valid = (3..=165).contains(&s.len())
            && s.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '{' | '}')
            });
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(LabelError::Invalid(s.to_string()))
        }
    }

    pub fn twin_persisted() -> Self {
        Self(Self::TWIN_PERSISTED.to_string())
    }

    pub fn live_response() -> Self {
        Self(Self::LIVE_RESPONSE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_built_in(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::TWIN_PERSISTED | Self::LIVE_RESPONSE | Self::SEARCH_PERSISTED
        )
    }

    pub fn is_live_response(&self) -> bool {
        self.0 == Self::LIVE_RESPONSE
    }

    /// Resolve `{{connection:id}}` and check the connection prefix rule for
    /// labels declared by a source of `connection`.
    pub fn resolve_declared(&self, connection: &ConnectionId) -> Result<Self, LabelError> {
        let resolved = Self::parse(&self.0.replace(CONNECTION_ID_PLACEHOLDER, connection.as_str()))?;
        let prefix = format!("{}:", connection);
        if resolved.is_built_in() || resolved.0.starts_with(&prefix) {
            Ok(resolved)
        } else {
            Err(LabelError::NotPrefixed {
                label: resolved.0,
                connection: connection.to_string(),
            })
        }
    }
}

impl fmt::Display for AckLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AckLabel {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AckLabel> for String {
    fn from(label: AckLabel) -> Self {
        label.0
    }
}

// =============================================================================
// SINGLE ACKNOWLEDGEMENT
// =============================================================================

/// Outcome for one label of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub label: AckLabel,
    pub entity_id: EntityId,
    pub status: StatusCode,
    /// Synthesized for a target that structurally could not deliver.
    pub weak: bool,
    pub headers: Headers,
    pub payload: Option<Value>,
}

impl Acknowledgement {
    pub fn new(label: AckLabel, entity_id: EntityId, status: StatusCode, headers: Headers) -> Self {
        Self {
            label,
            entity_id,
            status,
            weak: false,
            headers,
            payload: None,
        }
    }

    /// Weak (synthesized) success.
    pub fn weak(label: AckLabel, entity_id: EntityId, headers: Headers, reason: &str) -> Self {
        Self {
            label,
            entity_id,
            status: StatusCode::OK,
            weak: true,
            headers,
            payload: Some(json!({ "message": reason })),
        }
    }

    /// Timeout failure for a label that never arrived.
    pub fn timeout(label: AckLabel, entity_id: EntityId, headers: Headers) -> Self {
        let message = format!("The acknowledgement '{}' was not received in time", label);
        Self {
            label,
            entity_id,
            status: StatusCode::REQUEST_TIMEOUT,
            weak: false,
            headers,
            payload: Some(json!({ "message": message })),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_timeout(&self) -> bool {
        self.status.is_timeout()
    }

    pub fn into_signal(self) -> Signal {
        let signal = Signal::from_kind(
            SignalKind::Acknowledgement {
                label: self.label,
                status: self.status,
                weak: self.weak,
            },
            self.entity_id,
        )
        .with_headers(self.headers);
        match self.payload {
            Some(payload) => signal.with_payload(payload),
            None => signal,
        }
    }

    pub fn from_signal(signal: &Signal) -> Option<Self> {
        match signal.kind() {
            SignalKind::Acknowledgement {
                label,
                status,
                weak,
            } => Some(Self {
                label: label.clone(),
                entity_id: signal.entity_id().clone(),
                status: *status,
                weak: *weak,
                headers: signal.headers().clone(),
                payload: signal.payload().cloned(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// The aggregated acknowledgements of one signal, keyed by label.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgements {
    entity_id: EntityId,
    acks: Vec<Acknowledgement>,
    headers: Headers,
}

impl Acknowledgements {
    /// Build an aggregate. A later acknowledgement for an already present
    /// label replaces the earlier one.
    pub fn new(entity_id: EntityId, acks: Vec<Acknowledgement>, headers: Headers) -> Self {
        let mut aggregate = Self {
            entity_id,
            acks: Vec::with_capacity(acks.len()),
            headers,
        };
        for ack in acks {
            aggregate.push(ack);
        }
        aggregate
    }

    pub fn empty(entity_id: EntityId, headers: Headers) -> Self {
        Self::new(entity_id, Vec::new(), headers)
    }

    pub fn push(&mut self, ack: Acknowledgement) {
        match self.acks.iter_mut().find(|a| a.label == ack.label) {
            Some(existing) => *existing = ack,
            None => self.acks.push(ack),
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.acks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acks.is_empty()
    }

    pub fn get(&self, label: &AckLabel) -> Option<&Acknowledgement> {
        self.acks.iter().find(|a| &a.label == label)
    }

    pub fn contains(&self, label: &AckLabel) -> bool {
        self.get(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Acknowledgement> {
        self.acks.iter()
    }

    pub fn successful(&self) -> impl Iterator<Item = &Acknowledgement> {
        self.acks.iter().filter(|a| a.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &Acknowledgement> {
        self.acks.iter().filter(|a| !a.is_success())
    }

    /// Combined status: the single status if all agree, otherwise
    /// `424 Failed Dependency` (or `200` when everything succeeded).
    pub fn status(&self) -> StatusCode {
        let Some(first) = self.acks.first() else {
            return StatusCode::OK;
        };
        if self.acks.iter().all(|a| a.status == first.status) {
            first.status
        } else if self.acks.iter().all(Acknowledgement::is_success) {
            StatusCode::OK
        } else {
            StatusCode::FAILED_DEPENDENCY
        }
    }

    pub fn into_acks(self) -> Vec<Acknowledgement> {
        self.acks
    }

    pub fn into_signal(self) -> Signal {
        let status = self.status();
        Signal::from_kind(
            SignalKind::Acknowledgements {
                acks: self.acks,
                status,
            },
            self.entity_id,
        )
        .with_headers(self.headers)
    }
}
