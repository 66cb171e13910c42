//! # External Messages
//!
//! The transport-neutral representation of a message as it is received from
//! or handed to an external system (AMQP, MQTT, Kafka, HTTP ...).

use crate::acknowledgement::AckLabel;
use crate::connection::{Enforcement, SourceBinding};
use crate::headers::Headers;
use std::fmt;
use std::sync::Arc;

/// Raw payload of an external message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Text(text) => text.trim().is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Payload as UTF-8 text, if it is text or valid UTF-8 bytes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Empty => None,
            Payload::Text(text) => Some(text),
            Payload::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }
}

/// Subjects on whose behalf a message is processed.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AuthorizationContext(Vec<String>);

impl AuthorizationContext {
    pub fn new<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(subjects.into_iter().map(Into::into).collect())
    }

    pub fn subjects(&self) -> &[String] {
        &self.0
    }

    pub fn first_subject(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any subject of this context is contained in `allowed`.
    pub fn is_authorized_by(&self, allowed: &[&str]) -> bool {
        self.0.iter().any(|s| allowed.contains(&s.as_str()))
    }
}

/// Transport-level settlement of a consumed message.
///
/// Supplied by the source adapter; called once the pipeline knows whether the
/// message was processed successfully.
pub trait Settlement: Send + Sync + fmt::Debug {
    fn ack(&self);
    fn reject(&self, redeliver: bool);
}

/// An external message. Created at ingress or by outbound mapping.
#[derive(Debug, Clone)]
pub struct ExternalMessage {
    headers: Headers,
    payload: Payload,
    auth_context: AuthorizationContext,
    source: Option<SourceBinding>,
    payload_mapping: Option<Vec<String>>,
    enforcement: Option<Enforcement>,
    topic_path: Option<String>,
    settlement: Option<Arc<dyn Settlement>>,
    response: bool,
    error: bool,
}

impl ExternalMessage {
    pub fn builder(headers: Headers) -> ExternalMessageBuilder {
        ExternalMessageBuilder::new(headers)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    pub fn auth_context(&self) -> &AuthorizationContext {
        &self.auth_context
    }

    pub fn source(&self) -> Option<&SourceBinding> {
        self.source.as_ref()
    }

    /// Mapper names: the message override, else the source's list.
    pub fn payload_mapping(&self) -> Vec<String> {
        match (&self.payload_mapping, &self.source) {
            (Some(mapping), _) => mapping.clone(),
            (None, Some(binding)) => binding.source.payload_mapping.clone(),
            (None, None) => Vec::new(),
        }
    }

    pub fn enforcement(&self) -> Option<&Enforcement> {
        self.enforcement
            .as_ref()
            .or_else(|| self.source.as_ref()?.source.enforcement.as_ref())
    }

    /// Labels the originating source is allowed to satisfy.
    pub fn declared_acks(&self) -> &[AckLabel] {
        self.source
            .as_ref()
            .map(|b| b.source.declared_acks.as_slice())
            .unwrap_or(&[])
    }

    pub fn topic_path(&self) -> Option<&str> {
        self.topic_path.as_deref()
    }

    pub fn settlement(&self) -> Option<&Arc<dyn Settlement>> {
        self.settlement.as_ref()
    }

    pub fn is_response(&self) -> bool {
        self.response
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Copy with replaced headers.
    #[must_use]
    pub fn with_headers(&self, headers: Headers) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }
}

/// Builder for [`ExternalMessage`].
#[derive(Debug)]
pub struct ExternalMessageBuilder {
    message: ExternalMessage,
}

impl ExternalMessageBuilder {
    fn new(headers: Headers) -> Self {
        Self {
            message: ExternalMessage {
                headers,
                payload: Payload::Empty,
                auth_context: AuthorizationContext::default(),
                source: None,
                payload_mapping: None,
                enforcement: None,
                topic_path: None,
                settlement: None,
                response: false,
                error: false,
            },
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.message.payload = Payload::Text(text.into());
        self
    }

    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.message.payload = Payload::Bytes(bytes);
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.message.payload = payload;
        self
    }

    pub fn auth_context(mut self, auth_context: AuthorizationContext) -> Self {
        self.message.auth_context = auth_context;
        self
    }

    pub fn source(mut self, binding: SourceBinding) -> Self {
        if self.message.auth_context.is_empty() {
            self.message.auth_context = binding.source.auth_context.clone();
        }
        self.message.source = Some(binding);
        self
    }

    pub fn payload_mapping(mut self, mapping: Vec<String>) -> Self {
        self.message.payload_mapping = Some(mapping);
        self
    }

    pub fn enforcement(mut self, enforcement: Enforcement) -> Self {
        self.message.enforcement = Some(enforcement);
        self
    }

    pub fn topic_path(mut self, topic_path: impl Into<String>) -> Self {
        self.message.topic_path = Some(topic_path.into());
        self
    }

    pub fn settlement(mut self, settlement: Arc<dyn Settlement>) -> Self {
        self.message.settlement = Some(settlement);
        self
    }

    pub fn response(mut self, response: bool) -> Self {
        self.message.response = response;
        self
    }

    pub fn error(mut self, error: bool) -> Self {
        self.message.error = error;
        self
    }

    pub fn build(self) -> ExternalMessage {
        self.message
    }
}
