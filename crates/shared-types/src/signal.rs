//! # Canonical Signals
//!
//! The protocol-neutral unit the gateway translates to and from: commands,
//! events, live messages, responses and acknowledgements.
//!
//! Signals are immutable values. Pipeline stages derive new signals with the
//! `with_*` methods instead of mutating.

use crate::acknowledgement::{AckLabel, Acknowledgement};
use crate::errors::HeaderError;
use crate::headers::Headers;
use crate::ids::EntityId;
use crate::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Group segment of every topic path this gateway emits.
pub const THINGS_GROUP: &str = "things";

// =============================================================================
// CHANNEL / RESPONSE TYPE
// =============================================================================

/// Twin signals target the persisted digital twin, live signals the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Twin,
    Live,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Twin => "twin",
            Channel::Live => "live",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twin" => Some(Channel::Twin),
            "live" => Some(Channel::Live),
            _ => None,
        }
    }
}

/// Shape of a command response, used by reply targets and diversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Response,
    Error,
    Nack,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Response => "response",
            ResponseType::Error => "error",
            ResponseType::Nack => "nack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "response" => Some(ResponseType::Response),
            "error" => Some(ResponseType::Error),
            "nack" => Some(ResponseType::Nack),
            _ => None,
        }
    }
}

// =============================================================================
// SIGNAL KIND
// =============================================================================

/// What a signal is.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    /// A command such as `modifyThing`; queries (`retrieve*`) never request acks.
    Command { name: String, query: bool },
    /// An event such as `thingModified`.
    Event { name: String },
    /// A live message with a free-form subject.
    Message { subject: String },
    /// A response to a command.
    Response { name: String, status: StatusCode },
    /// A single acknowledgement for one label.
    Acknowledgement {
        label: AckLabel,
        status: StatusCode,
        weak: bool,
    },
    /// The aggregated acknowledgements of one command.
    Acknowledgements {
        acks: Vec<Acknowledgement>,
        status: StatusCode,
    },
}

// =============================================================================
// SIGNAL
// =============================================================================

/// Canonical, protocol-neutral signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    kind: SignalKind,
    channel: Channel,
    entity_id: EntityId,
    path: String,
    headers: Headers,
    payload: Option<Value>,
    revision: Option<u64>,
    extra: Option<Value>,
}

impl Signal {
    fn new(kind: SignalKind, entity_id: EntityId) -> Self {
        Self {
            kind,
            channel: Channel::Twin,
            entity_id,
            path: "/".to_string(),
            headers: Headers::new(),
            payload: None,
            revision: None,
            extra: None,
        }
    }

    pub fn command(name: impl Into<String>, entity_id: EntityId) -> Self {
        let name = name.into();
        let query = name.starts_with("retrieve");
        Self::new(SignalKind::Command { name, query }, entity_id)
    }

    pub fn event(name: impl Into<String>, entity_id: EntityId) -> Self {
        Self::new(SignalKind::Event { name: name.into() }, entity_id)
    }

    pub fn message(subject: impl Into<String>, entity_id: EntityId) -> Self {
        Self::new(
            SignalKind::Message {
                subject: subject.into(),
            },
            entity_id,
        )
        .with_channel(Channel::Live)
    }

    pub fn response(name: impl Into<String>, entity_id: EntityId, status: StatusCode) -> Self {
        Self::new(
            SignalKind::Response {
                name: name.into(),
                status,
            },
            entity_id,
        )
    }

    /// Structured error response (`{status, error, message}` body).
    pub fn error_response(
        entity_id: EntityId,
        status: StatusCode,
        error: &str,
        message: impl Into<String>,
        headers: Headers,
    ) -> Self {
        let message = message.into();
        Self::response("error", entity_id, status)
            .with_headers(headers)
            .with_payload(json!({
                "status": status.as_u16(),
                "error": error,
                "message": message,
            }))
    }

    pub(crate) fn from_kind(kind: SignalKind, entity_id: EntityId) -> Self {
        Self::new(kind, entity_id)
    }

    // =========================================================================
    // DERIVATION (copy-on-write)
    // =========================================================================

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn kind(&self) -> &SignalKind {
        &self.kind
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn extra(&self) -> Option<&Value> {
        self.extra.as_ref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.headers.correlation_id()
    }

    pub fn requested_acks(&self) -> Result<Vec<AckLabel>, HeaderError> {
        self.headers.requested_acks()
    }

    /// Command name, event name, message subject or acknowledgement label.
    pub fn name(&self) -> &str {
        match &self.kind {
            SignalKind::Command { name, .. }
            | SignalKind::Event { name }
            | SignalKind::Response { name, .. } => name,
            SignalKind::Message { subject } => subject,
            SignalKind::Acknowledgement { label, .. } => label.as_str(),
            SignalKind::Acknowledgements { .. } => "acknowledgements",
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match &self.kind {
            SignalKind::Response { status, .. }
            | SignalKind::Acknowledgement { status, .. }
            | SignalKind::Acknowledgements { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self.kind, SignalKind::Command { .. })
    }

    pub fn is_query(&self) -> bool {
        matches!(self.kind, SignalKind::Command { query: true, .. })
    }

    /// Commands and live messages are answered by a response.
    pub fn expects_response(&self) -> bool {
        matches!(
            self.kind,
            SignalKind::Command { .. } | SignalKind::Message { .. }
        )
    }

    pub fn is_weak_ack(&self) -> bool {
        matches!(self.kind, SignalKind::Acknowledgement { weak: true, .. })
    }

    /// A response on the live channel, i.e. an answer produced by a device.
    pub fn is_live_response(&self) -> bool {
        matches!(self.kind, SignalKind::Response { .. }) && self.channel == Channel::Live
    }

    /// Response type of a command-response shaped signal.
    ///
    /// Weak acknowledgements, events, commands and messages have none.
    pub fn response_type(&self) -> Option<ResponseType> {
        match &self.kind {
            SignalKind::Response { status, .. } => Some(if status.is_success() {
                ResponseType::Response
            } else {
                ResponseType::Error
            }),
            SignalKind::Acknowledgement { weak: true, .. } => None,
            SignalKind::Acknowledgement { status, .. }
            | SignalKind::Acknowledgements { status, .. } => Some(if status.is_success() {
                ResponseType::Response
            } else {
                ResponseType::Nack
            }),
            _ => None,
        }
    }

    /// Whether the signal failed.
    ///
    /// A live response only counts as failed when it timed out; any other
    /// status is the device's legitimate answer.
    pub fn is_failed(&self) -> bool {
        match (&self.kind, self.status()) {
            (SignalKind::Response { .. }, Some(status)) if self.is_live_response() => {
                status.is_timeout()
            }
            (_, Some(status)) => !status.is_success(),
            (_, None) => false,
        }
    }

    pub fn topic_path(&self) -> TopicPath {
        let (criterion, action, subject) = match &self.kind {
            SignalKind::Command { name, .. } => (Criterion::Commands, Some(command_action(name)), None),
            SignalKind::Response { name, status } if name == "error" && !status.is_success() => {
                (Criterion::Errors, None, None)
            }
            SignalKind::Response { name, .. } => {
                (Criterion::Commands, Some(command_action(name)), None)
            }
            SignalKind::Event { name } => (Criterion::Events, Some(event_action(name)), None),
            SignalKind::Message { subject } => (Criterion::Messages, None, Some(subject.clone())),
            SignalKind::Acknowledgement { label, .. } => {
                (Criterion::Acks, None, Some(label.as_str().to_string()))
            }
            SignalKind::Acknowledgements { .. } => (Criterion::Acks, None, None),
        };
        TopicPath {
            namespace: self.entity_id.namespace().to_string(),
            entity_name: self.entity_id.name().to_string(),
            group: THINGS_GROUP.to_string(),
            channel: self.channel,
            criterion,
            action,
            subject,
        }
    }
}

/// `modifyThing` -> `modify`.
fn command_action(name: &str) -> String {
    name.chars().take_while(|c| c.is_ascii_lowercase()).collect()
}

/// `thingModified` -> `modified`.
fn event_action(name: &str) -> String {
    match name.rfind(|c: char| c.is_ascii_uppercase()) {
        Some(idx) => name[idx..].to_ascii_lowercase(),
        None => name.to_string(),
    }
}

// =============================================================================
// TOPIC PATH
// =============================================================================

/// Criterion segment of a topic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Commands,
    Events,
    Messages,
    Acks,
    Errors,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Commands => "commands",
            Criterion::Events => "events",
            Criterion::Messages => "messages",
            Criterion::Acks => "acks",
            Criterion::Errors => "errors",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commands" => Some(Criterion::Commands),
            "events" => Some(Criterion::Events),
            "messages" => Some(Criterion::Messages),
            "acks" => Some(Criterion::Acks),
            "errors" => Some(Criterion::Errors),
            _ => None,
        }
    }
}

/// `namespace/name/group/channel/criterion[/action-or-subject]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    pub namespace: String,
    pub entity_name: String,
    pub group: String,
    pub channel: Channel,
    pub criterion: Criterion,
    pub action: Option<String>,
    pub subject: Option<String>,
}

impl TopicPath {
    /// Parse a topic path string. Returns `None` if it is malformed.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(6, '/');
        let namespace = parts.next()?.to_string();
        let entity_name = parts.next()?.to_string();
        let group = parts.next()?.to_string();
        let channel = Channel::parse(parts.next()?)?;
        let criterion = Criterion::parse(parts.next()?)?;
        let last = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        if entity_name.is_empty() || group != THINGS_GROUP {
            return None;
        }
        let (action, subject) = match criterion {
            Criterion::Commands | Criterion::Events => (Some(last?), None),
            Criterion::Messages | Criterion::Acks => (None, last),
            Criterion::Errors => (None, None),
        };
        Some(Self {
            namespace,
            entity_name,
            group,
            channel,
            criterion,
            action,
            subject,
        })
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        EntityId::new(self.namespace.clone(), self.entity_name.clone()).ok()
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.namespace,
            self.entity_name,
            self.group,
            self.channel.as_str(),
            self.criterion.as_str()
        )?;
        if let Some(action) = &self.action {
            write!(f, "/{}", action)?;
        } else if let Some(subject) = &self.subject {
            write!(f, "/{}", subject)?;
        }
        Ok(())
    }
}
