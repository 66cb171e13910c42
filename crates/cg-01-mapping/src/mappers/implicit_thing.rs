//! Creates a thing from a template whenever a device announces itself.
//!
//! Options:
//! - `thing`: JSON template of the thing, must contain a `thingId`
//! - `commandHeaders`: extra headers for the emitted `createThing` command
//!
//! Both may use placeholders such as `{{ header:device_id }}`.

use crate::domain::PlaceholderContext;
use crate::error::{MappingError, RegistryError};
use crate::ports::{MapperContext, MapperFactory, MessageMapper};
use serde_json::{Map, Value};
use shared_types::{ConnectionId, EntityId, ExternalMessage, Signal};

pub const ENGINE: &str = "ImplicitThingCreation";

#[derive(Debug)]
pub struct ImplicitThingCreationMapper {
    id: String,
    connection_id: ConnectionId,
    thing: Value,
    command_headers: Map<String, Value>,
}

impl MessageMapper for ImplicitThingCreationMapper {
    fn id(&self) -> &str {
        &self.id
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        let ctx = PlaceholderContext::new()
            .with_headers(message.headers())
            .with_auth_context(message.auth_context())
            .with_connection(&self.connection_id);

        let thing = ctx.resolve_json(&self.thing)?;
        let thing_id = thing
            .get("thingId")
            .and_then(Value::as_str)
            .ok_or_else(|| MappingError::protocol(None, "resolved thing has no thingId"))?;
        let entity_id =
            EntityId::parse(thing_id).map_err(|e| MappingError::protocol(None, e.to_string()))?;

        let mut headers = message.headers().clone();
        for (key, template) in &self.command_headers {
            let value = match template {
                Value::String(s) => ctx.resolve_template(s)?,
                other => other.to_string(),
            };
            headers.insert(key.as_str(), value);
        }

        Ok(vec![Signal::command("createThing", entity_id)
            .with_headers(headers)
            .with_payload(thing)])
    }

    fn map_outbound(&mut self, _signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct ImplicitThingCreationMapperFactory;

impl MapperFactory for ImplicitThingCreationMapperFactory {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        let thing = context
            .option("thing")
            .filter(|t| t.get("thingId").map(Value::is_string).unwrap_or(false))
            .cloned()
            .ok_or_else(|| context.invalid_options("'thing' must be an object with a 'thingId'"))?;
        let command_headers = match context.option("commandHeaders") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(context.invalid_options("'commandHeaders' must be an object")),
        };
        Ok(Box::new(ImplicitThingCreationMapper {
            id: context.id.clone(),
            connection_id: context.connection_id.clone(),
            thing,
            command_headers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{Headers, MappingDefinition};

    fn mapper(options: Value) -> Result<Box<dyn MessageMapper>, RegistryError> {
        ImplicitThingCreationMapperFactory.create(&MapperContext {
            id: "implicit".into(),
            connection_id: ConnectionId::parse("conn-x").unwrap(),
            definition: MappingDefinition {
                engine: ENGINE.into(),
                options: options.as_object().cloned().unwrap_or_default(),
                ..MappingDefinition::default()
            },
        })
    }

    #[test]
    fn test_creates_thing_from_headers() {
        let mut mapper = mapper(json!({
            "thing": {
                "thingId": "devices:{{ header:device_id }}",
                "attributes": {"via": "{{ connection:id }}"}
            },
            "commandHeaders": {"requested-acks": "twin-persisted"}
        }))
        .unwrap();

        let message = ExternalMessage::builder([("device_id", "d-42")].into_iter().collect())
            .build();
        let signals = mapper.map_inbound(&message).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].name(), "createThing");
        assert_eq!(signals[0].entity_id().to_string(), "devices:d-42");
        assert_eq!(signals[0].payload().unwrap()["attributes"]["via"], "conn-x");
        assert_eq!(signals[0].requested_acks().unwrap()[0].as_str(), "twin-persisted");
    }

    #[test]
    fn test_missing_header_is_error() {
        let mut mapper = mapper(json!({"thing": {"thingId": "devices:{{ header:device_id }}"}})).unwrap();
        let message = ExternalMessage::builder(Headers::new()).build();
        assert!(matches!(
            mapper.map_inbound(&message),
            Err(MappingError::Placeholder(_))
        ));
    }

    #[test]
    fn test_outbound_drops() {
        let mut mapper = mapper(json!({"thing": {"thingId": "a:b"}})).unwrap();
        let signal = Signal::event("thingCreated", EntityId::parse("a:b").unwrap());
        assert!(mapper.map_outbound(&signal).unwrap().is_empty());
    }

    #[test]
    fn test_requires_thing_id() {
        assert!(mapper(json!({"thing": {"attributes": {}}})).is_err());
        assert!(mapper(json!({})).is_err());
    }
}
