//! # Ditto Protocol Adapter
//!
//! Conversion between the JSON protocol envelope
//! `{topic, path, headers, value, status, revision, extra}` and signals.

use crate::error::MappingError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{
    keys, AckLabel, Acknowledgement, Acknowledgements, Criterion, EntityId, ExternalMessage,
    Headers, ResponseType, Signal, SignalKind, StatusCode, TopicPath,
};

/// Content type of protocol messages.
pub const PROTOCOL_CONTENT_TYPE: &str = "application/vnd.eclipse.ditto+json";

/// Headers that never leave the gateway.
const INTERNAL_HEADERS: [&str; 4] = [
    keys::REPLY_TARGET,
    keys::READ_SUBJECTS,
    keys::INBOUND_PAYLOAD_MAPPER,
    keys::DIVERT_EXPECTED_RESPONSE_TYPES,
];

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    topic: String,
    #[serde(default = "root_path")]
    path: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra: Option<Value>,
}

fn root_path() -> String {
    "/".to_string()
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Thing resource addressed by a protocol path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Thing,
    Attributes,
    Attribute,
    Definition,
    PolicyId,
    Features,
    Feature,
    FeatureDefinition,
    FeatureProperties,
    FeatureProperty,
}

impl Resource {
    fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Some(match segments.as_slice() {
            [] => Resource::Thing,
            ["attributes"] => Resource::Attributes,
            ["attributes", ..] => Resource::Attribute,
            ["definition"] => Resource::Definition,
            ["policyId"] => Resource::PolicyId,
            ["features"] => Resource::Features,
            ["features", _] => Resource::Feature,
            ["features", _, "definition"] => Resource::FeatureDefinition,
            ["features", _, "properties"] => Resource::FeatureProperties,
            ["features", _, "properties", ..] => Resource::FeatureProperty,
            _ => return None,
        })
    }

    fn as_str(&self) -> &'static str {
        match self {
            Resource::Thing => "Thing",
            Resource::Attributes => "Attributes",
            Resource::Attribute => "Attribute",
            Resource::Definition => "ThingDefinition",
            Resource::PolicyId => "PolicyId",
            Resource::Features => "Features",
            Resource::Feature => "Feature",
            Resource::FeatureDefinition => "FeatureDefinition",
            Resource::FeatureProperties => "FeatureProperties",
            Resource::FeatureProperty => "FeatureProperty",
        }
    }
}

fn command_name(action: &str, resource: Resource, topic: &str) -> Result<String, MappingError> {
    match (action, resource) {
        ("create", Resource::Thing) => Ok("createThing".to_string()),
        ("merge", _) => Ok("mergeThing".to_string()),
        ("modify" | "retrieve" | "delete", resource) => Ok(format!("{}{}", action, resource.as_str())),
        _ => Err(MappingError::protocol(
            Some(topic.to_string()),
            format!("command action '{}' is not supported on this path", action),
        )),
    }
}

fn event_name(action: &str, resource: Resource, topic: &str) -> Result<String, MappingError> {
    let resource = match action {
        "merged" => Resource::Thing,
        "created" | "modified" | "deleted" => resource,
        _ => {
            return Err(MappingError::protocol(
                Some(topic.to_string()),
                format!("unknown event action '{}'", action),
            ))
        }
    };
    let name = resource.as_str();
    let mut out = String::with_capacity(name.len() + action.len());
    out.push_str(&name[..1].to_ascii_lowercase());
    out.push_str(&name[1..]);
    out.push_str(&action[..1].to_ascii_uppercase());
    out.push_str(&action[1..]);
    Ok(out)
}

// =============================================================================
// INBOUND
// =============================================================================

/// Map an external protocol message. An empty payload maps to nothing.
pub fn to_signals(message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
    if message.payload().is_empty() {
        return Ok(Vec::new());
    }
    let text = message
        .payload()
        .as_text()
        .ok_or_else(|| MappingError::InvalidPayload("payload is not valid UTF-8".into()))?;
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| MappingError::InvalidPayload(e.to_string()))?;
    Ok(vec![envelope_to_signal(envelope, message.headers())?])
}

fn envelope_to_signal(envelope: Envelope, external: &Headers) -> Result<Signal, MappingError> {
    let raw_topic = envelope.topic.clone();
    let topic = TopicPath::parse(&raw_topic)
        .ok_or_else(|| MappingError::protocol(Some(raw_topic.clone()), "malformed topic path"))?;
    let entity_id = topic
        .entity_id()
        .ok_or_else(|| MappingError::protocol(Some(raw_topic.clone()), "topic has no valid entity id"))?;

    let mut headers = external.clone();
    for (key, value) in &envelope.headers {
        match value {
            Value::String(s) => headers.insert(key.as_str(), s.as_str()),
            other => headers.insert(key.as_str(), other.to_string()),
        }
    }

    let status = envelope.status.map(StatusCode::new);
    let resource = || {
        Resource::from_path(&envelope.path).ok_or_else(|| MappingError::UnknownPath {
            topic: Some(raw_topic.clone()),
            path: envelope.path.clone(),
        })
    };
    let action = topic.action.as_deref().unwrap_or_default();

    let signal = match topic.criterion {
        Criterion::Commands => {
            let name = command_name(action, resource()?, &raw_topic)?;
            match status {
                Some(status) => Signal::response(name, entity_id, status),
                None => Signal::command(name, entity_id),
            }
        }
        Criterion::Events => Signal::event(event_name(action, resource()?, &raw_topic)?, entity_id),
        Criterion::Messages => {
            let subject = topic.subject.clone().ok_or_else(|| {
                MappingError::protocol(Some(raw_topic.clone()), "message topic has no subject")
            })?;
            match status {
                Some(status) => Signal::response(subject, entity_id, status),
                None => Signal::message(subject, entity_id),
            }
        }
        Criterion::Acks => match &topic.subject {
            Some(label) => {
                let label = AckLabel::parse(label)
                    .map_err(|e| MappingError::protocol(Some(raw_topic.clone()), e.to_string()))?;
                Acknowledgement::new(
                    label,
                    entity_id,
                    status.unwrap_or(StatusCode::OK),
                    headers.clone(),
                )
                .into_signal()
            }
            None => aggregate_from_value(entity_id, envelope.value.as_ref(), &headers, &raw_topic)?,
        },
        Criterion::Errors => Signal::response(
            "error",
            entity_id,
            status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        ),
    };

    let mut signal = signal
        .with_headers(headers)
        .with_channel(topic.channel)
        .with_path(envelope.path);
    if topic.criterion != Criterion::Acks || topic.subject.is_some() {
        if let Some(value) = envelope.value {
            signal = signal.with_payload(value);
        }
    }
    if let Some(revision) = envelope.revision {
        signal = signal.with_revision(revision);
    }
    if let Some(extra) = envelope.extra {
        signal = signal.with_extra(extra);
    }
    Ok(signal)
}

fn aggregate_from_value(
    entity_id: EntityId,
    value: Option<&Value>,
    headers: &Headers,
    topic: &str,
) -> Result<Signal, MappingError> {
    let Some(Value::Object(entries)) = value else {
        return Err(MappingError::protocol(
            Some(topic.to_string()),
            "aggregated acknowledgements require an object value",
        ));
    };
    let mut acks = Vec::with_capacity(entries.len());
    for (label, entry) in entries {
        let label = AckLabel::parse(label)
            .map_err(|e| MappingError::protocol(Some(topic.to_string()), e.to_string()))?;
        let status = entry
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .map(StatusCode::new)
            .unwrap_or(StatusCode::OK);
        let mut ack = Acknowledgement::new(label, entity_id.clone(), status, headers.clone());
        if let Some(payload) = entry.get("payload") {
            ack = ack.with_payload(payload.clone());
        }
        acks.push(ack);
    }
    Ok(Acknowledgements::new(entity_id, acks, headers.clone()).into_signal())
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Map a signal to one external protocol message.
pub fn to_external(signal: &Signal) -> Result<ExternalMessage, MappingError> {
    let topic = signal.topic_path().to_string();

    let mut headers = Headers::new();
    for (key, value) in signal.headers().iter() {
        if !INTERNAL_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(key)) {
            headers.insert(key, value);
        }
    }

    let value = match signal.kind() {
        SignalKind::Acknowledgements { acks, .. } => {
            let mut entries = Map::with_capacity(acks.len());
            for ack in acks {
                let mut entry = Map::new();
                entry.insert("status".into(), Value::from(ack.status.as_u16()));
                if let Some(payload) = &ack.payload {
                    entry.insert("payload".into(), payload.clone());
                }
                entries.insert(ack.label.to_string(), Value::Object(entry));
            }
            Some(Value::Object(entries))
        }
        _ => signal.payload().cloned(),
    };

    let envelope = Envelope {
        topic: topic.clone(),
        path: signal.path().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
        value,
        status: signal.status().map(|s| s.as_u16()),
        revision: signal.revision(),
        extra: signal.extra().cloned(),
    };
    let text = serde_json::to_string(&envelope)
        .map_err(|e| MappingError::protocol(Some(topic.clone()), e.to_string()))?;

    let response_type = signal.response_type();
    headers.insert(keys::CONTENT_TYPE, PROTOCOL_CONTENT_TYPE);
    Ok(ExternalMessage::builder(headers)
        .text(text)
        .topic_path(topic)
        .response(response_type.is_some())
        .error(matches!(
            response_type,
            Some(ResponseType::Error | ResponseType::Nack)
        ))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::Channel;

    fn inbound(payload: Value) -> ExternalMessage {
        ExternalMessage::builder(Headers::new())
            .text(payload.to_string())
            .build()
    }

    fn single(payload: Value) -> Signal {
        let mut signals = to_signals(&inbound(payload)).unwrap();
        assert_eq!(signals.len(), 1);
        signals.remove(0)
    }

    #[test]
    fn test_modify_thing_command() {
        let signal = single(json!({
            "topic": "ns/thing-1/things/twin/commands/modify",
            "path": "/",
            "headers": {"correlation-id": "c-1"},
            "value": {"attributes": {"a": 1}}
        }));
        assert_eq!(signal.name(), "modifyThing");
        assert_eq!(signal.entity_id().to_string(), "ns:thing-1");
        assert_eq!(signal.correlation_id(), Some("c-1"));
        assert!(signal.is_command());
    }

    #[test]
    fn test_command_names_from_path() {
        let name = |action: &str, path: &str| {
            single(json!({"topic": format!("ns/t/things/twin/commands/{}", action), "path": path}))
                .name()
                .to_string()
        };
        assert_eq!(name("modify", "/attributes/location"), "modifyAttribute");
        assert_eq!(name("retrieve", "/features/temp/properties"), "retrieveFeatureProperties");
        assert_eq!(name("delete", "/features/temp/properties/value"), "deleteFeatureProperty");
        assert_eq!(name("merge", "/attributes"), "mergeThing");
        assert_eq!(name("modify", "/definition"), "modifyThingDefinition");
    }

    #[test]
    fn test_retrieve_is_query() {
        let signal = single(json!({"topic": "ns/t/things/twin/commands/retrieve", "path": "/"}));
        assert!(signal.is_query());
    }

    #[test]
    fn test_event_and_live_message() {
        let event = single(json!({
            "topic": "ns/t/things/twin/events/modified",
            "path": "/features/temp/properties/value",
            "value": 21,
            "revision": 7
        }));
        assert_eq!(event.name(), "featurePropertyModified");
        assert_eq!(event.revision(), Some(7));

        let message = single(json!({
            "topic": "ns/t/things/live/messages/ping",
            "path": "/inbox/messages/ping",
            "value": "hello"
        }));
        assert_eq!(message.channel(), Channel::Live);
        assert_eq!(message.name(), "ping");
    }

    #[test]
    fn test_inbound_acknowledgement() {
        let signal = single(json!({
            "topic": "ns/t/things/twin/acks/conn:custom",
            "path": "/",
            "status": 204
        }));
        let ack = Acknowledgement::from_signal(&signal).unwrap();
        assert_eq!(ack.label.as_str(), "conn:custom");
        assert_eq!(ack.status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_inbound_errors() {
        assert!(to_signals(&inbound(json!({"topic": "bad"}))).is_err());
        let unknown_path = to_signals(&inbound(json!({
            "topic": "ns/t/things/twin/commands/modify",
            "path": "/unknown/x"
        })));
        assert!(matches!(unknown_path, Err(MappingError::UnknownPath { .. })));
        let not_json = ExternalMessage::builder(Headers::new()).text("{").build();
        assert!(matches!(to_signals(&not_json), Err(MappingError::InvalidPayload(_))));
    }

    #[test]
    fn test_empty_payload_maps_to_nothing() {
        let message = ExternalMessage::builder(Headers::new()).build();
        assert!(to_signals(&message).unwrap().is_empty());
    }

    #[test]
    fn test_outbound_event() {
        let signal = Signal::event("thingModified", EntityId::parse("ns:t").unwrap())
            .with_payload(json!({"attributes": {}}))
            .with_header(keys::CORRELATION_ID, "c-9")
            .with_header(keys::REPLY_TARGET, "0");
        let message = to_external(&signal).unwrap();
        assert_eq!(message.topic_path(), Some("ns/t/things/twin/events/modified"));
        assert_eq!(message.content_type(), Some(PROTOCOL_CONTENT_TYPE));
        assert!(!message.headers().contains(keys::REPLY_TARGET));

        let body: Value = serde_json::from_str(message.payload().as_text().unwrap()).unwrap();
        assert_eq!(body["topic"], "ns/t/things/twin/events/modified");
        assert_eq!(body["headers"]["correlation-id"], "c-9");
    }

    #[test]
    fn test_outbound_error_response_flags() {
        let signal = Signal::response("modifyThing", EntityId::parse("ns:t").unwrap(), StatusCode::FORBIDDEN);
        let message = to_external(&signal).unwrap();
        assert!(message.is_response());
        assert!(message.is_error());
    }

    #[test]
    fn test_event_round_trip_keeps_name() {
        let original = Signal::event("attributeDeleted", EntityId::parse("ns:t").unwrap())
            .with_path("/attributes/a");
        let external = to_external(&original).unwrap();
        let back = to_signals(&external).unwrap();
        assert_eq!(back[0].name(), "attributeDeleted");
    }
}
