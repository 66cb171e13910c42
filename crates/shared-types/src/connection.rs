//! # Connection Configuration
//!
//! Read-only view of a connection's sources, targets and payload mapping
//! definitions. Validation and persistence of this configuration live outside
//! the processing core; here we only resolve acknowledgement labels and
//! reject labels issued by more than one target.

use crate::acknowledgement::AckLabel;
use crate::errors::LabelError;
use crate::headers::{keys, split_list};
use crate::ids::ConnectionId;
use crate::message::AuthorizationContext;
use crate::signal::{Channel, ResponseType, Signal, SignalKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// PAYLOAD MAPPING
// =============================================================================

/// Configuration of one named payload mapper instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingDefinition {
    /// Mapper engine, e.g. `Ditto`, `Duplicate`, `ImplicitThingCreation`.
    pub engine: String,
    /// Engine-specific options.
    pub options: serde_json::Map<String, serde_json::Value>,
    /// Content types this mapper never handles.
    pub content_type_blocklist: Vec<String>,
    /// Named conditions that must all hold for inbound mapping.
    pub incoming_conditions: BTreeMap<String, String>,
    /// Named conditions that must all hold for outbound mapping.
    pub outgoing_conditions: BTreeMap<String, String>,
}

/// Header name -> value template (may contain placeholders).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderMapping(BTreeMap<String, String>);

impl HeaderMapping {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// SOURCES
// =============================================================================

/// Identity check: the resolved `input` must equal one resolved filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enforcement {
    pub input: String,
    pub filters: Vec<String>,
}

/// Where responses to commands received via a source are published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTarget {
    pub address: String,
    #[serde(default)]
    pub header_mapping: HeaderMapping,
    #[serde(default = "default_expected_response_types")]
    pub expected_response_types: Vec<ResponseType>,
}

fn default_expected_response_types() -> Vec<ResponseType> {
    vec![ResponseType::Response, ResponseType::Error, ResponseType::Nack]
}

impl ReplyTarget {
    pub fn expects(&self, response_type: ResponseType) -> bool {
        self.expected_response_types.contains(&response_type)
    }
}

/// An inbound source of a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Source {
    pub addresses: Vec<String>,
    pub auth_context: AuthorizationContext,
    pub enforcement: Option<Enforcement>,
    /// Labels this source may satisfy; also bounds requested acks.
    pub declared_acks: Vec<AckLabel>,
    /// Condition on external headers; false clears requested acks.
    pub acknowledgement_filter: Option<String>,
    pub payload_mapping: Vec<String>,
    pub header_mapping: HeaderMapping,
    pub reply_target: Option<ReplyTarget>,
}

/// A source together with its index inside the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBinding {
    pub index: usize,
    pub source: Arc<Source>,
}

impl SourceBinding {
    pub fn new(index: usize, source: Source) -> Self {
        Self {
            index,
            source: Arc::new(source),
        }
    }
}

// =============================================================================
// TARGETS
// =============================================================================

/// Signal streams a target may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    TwinEvents,
    LiveEvents,
    LiveCommands,
    LiveMessages,
    DivertedResponses,
}

impl Topic {
    pub fn matches(&self, signal: &Signal) -> bool {
        match (self, signal.kind(), signal.channel()) {
            (Topic::TwinEvents, SignalKind::Event { .. }, Channel::Twin) => true,
            (Topic::LiveEvents, SignalKind::Event { .. }, Channel::Live) => true,
            (Topic::LiveCommands, SignalKind::Command { .. }, Channel::Live) => true,
            (Topic::LiveMessages, SignalKind::Message { .. }, _) => true,
            (Topic::DivertedResponses, _, _) => {
                signal.response_type().is_some()
                    && signal
                        .headers()
                        .contains(keys::DIVERTED_RESPONSE_FROM_CONNECTION)
            }
            _ => false,
        }
    }
}

/// Comma separated JSON paths to fetch as extra fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldSelector(Vec<String>);

impl FieldSelector {
    pub fn parse(s: &str) -> Self {
        Self(
            split_list(s)
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl From<String> for FieldSelector {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<FieldSelector> for String {
    fn from(selector: FieldSelector) -> Self {
        selector.to_string()
    }
}

/// A topic subscription with optional filter and enrichment selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredTopic {
    pub topic: Topic,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub extra_fields: Option<FieldSelector>,
}

impl FilteredTopic {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            filter: None,
            extra_fields: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_extra_fields(mut self, selector: &str) -> Self {
        self.extra_fields = Some(FieldSelector::parse(selector));
        self
    }

    /// The extra fields selector, ignoring empty ones.
    pub fn enrichment(&self) -> Option<&FieldSelector> {
        self.extra_fields.as_ref().filter(|s| !s.is_empty())
    }
}

/// An outbound publish destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Target {
    /// Address template, e.g. `telemetry/{{ thing:id }}`.
    pub address: String,
    pub topics: Vec<FilteredTopic>,
    pub payload_mapping: Vec<String>,
    pub auth_context: AuthorizationContext,
    pub issued_ack_label: Option<AckLabel>,
    pub header_mapping: HeaderMapping,
}

impl Target {
    /// The subscription through which `signal` reaches this target.
    pub fn subscription_for(&self, signal: &Signal) -> Option<&FilteredTopic> {
        self.topics.iter().find(|t| t.topic.matches(signal))
    }

    /// Read authorization against the signal's `read-subjects` header.
    pub fn is_authorized_for(&self, signal: &Signal) -> bool {
        match signal.headers().read_subjects() {
            Some(allowed) => self.auth_context.is_authorized_by(&allowed),
            None => true,
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// The parts of a connection the processing core needs.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sources: Vec<Arc<Source>>,
    targets: Vec<Arc<Target>>,
    mapping_definitions: BTreeMap<String, MappingDefinition>,
}

impl Connection {
    /// Build a connection, resolving `{{connection:id}}` in declared and
    /// issued acknowledgement labels.
    pub fn new(
        id: ConnectionId,
        sources: Vec<Source>,
        targets: Vec<Target>,
        mapping_definitions: BTreeMap<String, MappingDefinition>,
    ) -> Result<Self, LabelError> {
        let sources = sources
            .into_iter()
            .map(|mut source| {
                source.declared_acks = source
                    .declared_acks
                    .iter()
                    .map(|label| label.resolve_declared(&id))
                    .collect::<Result<_, _>>()?;
                Ok(Arc::new(source))
            })
            .collect::<Result<Vec<_>, LabelError>>()?;

        let targets = targets
            .into_iter()
            .map(|mut target| {
                if let Some(label) = &target.issued_ack_label {
                    let resolved = label.as_str().replace(
                        crate::acknowledgement::CONNECTION_ID_PLACEHOLDER,
                        id.as_str(),
                    );
                    target.issued_ack_label = Some(AckLabel::parse(&resolved)?);
                }
                Ok(Arc::new(target))
            })
            .collect::<Result<Vec<_>, LabelError>>()?;

        // live-response may be issued by any number of targets
        let mut issued = BTreeSet::new();
        for label in targets.iter().filter_map(|t| t.issued_ack_label.as_ref()) {
            if !label.is_live_response() && !issued.insert(label.as_str()) {
                return Err(LabelError::DuplicateIssued(label.as_str().to_string()));
            }
        }

        Ok(Self {
            id,
            sources,
            targets,
            mapping_definitions,
        })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn mapping_definitions(&self) -> &BTreeMap<String, MappingDefinition> {
        &self.mapping_definitions
    }

    pub fn source(&self, index: usize) -> Option<SourceBinding> {
        self.sources.get(index).map(|source| SourceBinding {
            index,
            source: Arc::clone(source),
        })
    }

    /// Whether any source of this connection declares `label`.
    pub fn declares(&self, label: &AckLabel) -> bool {
        self.sources.iter().any(|s| s.declared_acks.contains(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EntityId;

    fn thing() -> EntityId {
        EntityId::parse("ns:thing").unwrap()
    }

    #[test]
    fn test_topic_matching() {
        let twin_event = Signal::event("thingModified", thing());
        let live_event = Signal::event("thingModified", thing()).with_channel(Channel::Live);
        assert!(Topic::TwinEvents.matches(&twin_event));
        assert!(!Topic::TwinEvents.matches(&live_event));
        assert!(Topic::LiveEvents.matches(&live_event));
        assert!(Topic::LiveMessages.matches(&Signal::message("hello", thing())));
    }

    #[test]
    fn test_field_selector_parse() {
        let selector = FieldSelector::parse("/attributes/location, features/temp ,");
        assert_eq!(selector.paths(), &["attributes/location", "features/temp"]);
        assert_eq!(selector.to_string(), "attributes/location,features/temp");
    }

    #[test]
    fn test_connection_resolves_labels() {
        let id = ConnectionId::parse("conn-a").unwrap();
        let source = Source {
            declared_acks: vec![AckLabel::parse("{{connection:id}}:device").unwrap()],
            ..Source::default()
        };
        let target = Target {
            issued_ack_label: Some(AckLabel::parse("{{connection:id}}:published").unwrap()),
            ..Target::default()
        };
        let connection = Connection::new(id, vec![source], vec![target], BTreeMap::new()).unwrap();
        assert!(connection.declares(&AckLabel::parse("conn-a:device").unwrap()));
        assert_eq!(
            connection.targets()[0].issued_ack_label.as_ref().unwrap().as_str(),
            "conn-a:published"
        );
    }

    #[test]
    fn test_connection_rejects_foreign_declared_label() {
        let id = ConnectionId::parse("conn-a").unwrap();
        let source = Source {
            declared_acks: vec![AckLabel::parse("conn-b:device").unwrap()],
            ..Source::default()
        };
        assert!(Connection::new(id, vec![source], vec![], BTreeMap::new()).is_err());
    }

    #[test]
    fn test_connection_rejects_label_issued_twice() {
        let issuing = |address: &str, label: &str| Target {
            address: address.into(),
            issued_ack_label: Some(AckLabel::parse(label).unwrap()),
            ..Target::default()
        };

        let duplicated = Connection::new(
            ConnectionId::parse("conn").unwrap(),
            vec![],
            vec![issuing("broken", "conn:x"), issuing("ok", "{{connection:id}}:x")],
            BTreeMap::new(),
        );
        assert_eq!(
            duplicated.unwrap_err(),
            LabelError::DuplicateIssued("conn:x".into())
        );

        let live = Connection::new(
            ConnectionId::parse("conn").unwrap(),
            vec![],
            vec![issuing("a", "live-response"), issuing("b", "live-response")],
            BTreeMap::new(),
        );
        assert!(live.is_ok());
    }

    #[test]
    fn test_target_read_authorization() {
        let target = Target {
            auth_context: AuthorizationContext::new(["integration:reader"]),
            ..Target::default()
        };
        let open = Signal::event("thingModified", thing());
        let restricted = open.clone().with_header(keys::READ_SUBJECTS, "integration:other");
        let allowed = open.clone().with_header(keys::READ_SUBJECTS, "a,integration:reader");
        assert!(target.is_authorized_for(&open));
        assert!(!target.is_authorized_for(&restricted));
        assert!(target.is_authorized_for(&allowed));
    }
}
