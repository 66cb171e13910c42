//! # Mapper Registry
//!
//! Holds the configured mapper definitions of one connection and hands out a
//! fresh mapper instance per pipeline run.

use crate::domain::{Expression, PlaceholderContext};
use crate::error::{ExpressionError, MappingError, RegistryError};
use crate::mappers::{builtin_factories, DEFAULT_MAPPER_ID};
use crate::ports::{MapperContext, MapperFactory, MessageMapper};
use shared_types::{Connection, ConnectionId, MappingDefinition};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named condition; parse errors surface when the condition is evaluated.
#[derive(Debug, Clone)]
struct NamedCondition {
    name: String,
    expression: Result<Expression, ExpressionError>,
}

impl NamedCondition {
    fn parse_all(mapper: &str, conditions: &BTreeMap<String, String>) -> Vec<Self> {
        conditions
            .iter()
            .map(|(name, raw)| {
                let expression = Expression::parse(raw);
                if let Err(e) = &expression {
                    warn!(mapper = mapper, condition = %name, error = %e, "Invalid mapper condition");
                }
                Self {
                    name: name.clone(),
                    expression,
                }
            })
            .collect()
    }

    fn holds(&self, ctx: &PlaceholderContext<'_>) -> Result<bool, MappingError> {
        let expression = self.expression.as_ref().map_err(|e| MappingError::Condition {
            name: self.name.clone(),
            source: e.clone(),
        })?;
        Ok(expression.evaluate(ctx)?)
    }
}

struct RegisteredMapper {
    context: MapperContext,
    factory: Arc<dyn MapperFactory>,
    incoming: Vec<NamedCondition>,
    outgoing: Vec<NamedCondition>,
}

/// A freshly created mapper together with its configuration.
pub struct ResolvedMapper {
    registered: Arc<RegisteredMapper>,
    mapper: Box<dyn MessageMapper>,
}

impl ResolvedMapper {
    pub fn id(&self) -> &str {
        &self.registered.context.id
    }

    pub fn engine(&self) -> &str {
        &self.registered.context.definition.engine
    }

    /// Whether `content_type` is on this mapper's blocklist.
    ///
    /// Entries compare by media type, ignoring parameters; `type/*` matches
    /// any subtype.
    pub fn is_blocked(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let requested = media_type(content_type);
        self.registered
            .context
            .definition
            .content_type_blocklist
            .iter()
            .map(|entry| media_type(entry))
            .any(|entry| match entry.strip_suffix("/*") {
                Some(prefix) => requested
                    .split_once('/')
                    .map(|(main, _)| main == prefix)
                    .unwrap_or(false),
                None => entry == requested,
            })
    }

    pub fn incoming_conditions_hold(&self, ctx: &PlaceholderContext<'_>) -> Result<bool, MappingError> {
        all_hold(&self.registered.incoming, ctx)
    }

    pub fn outgoing_conditions_hold(&self, ctx: &PlaceholderContext<'_>) -> Result<bool, MappingError> {
        all_hold(&self.registered.outgoing, ctx)
    }

    pub fn mapper_mut(&mut self) -> &mut dyn MessageMapper {
        self.mapper.as_mut()
    }
}

impl fmt::Debug for ResolvedMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedMapper")
            .field("id", &self.id())
            .field("engine", &self.engine())
            .finish()
    }
}

fn all_hold(conditions: &[NamedCondition], ctx: &PlaceholderContext<'_>) -> Result<bool, MappingError> {
    for condition in conditions {
        if !condition.holds(ctx)? {
            debug!(condition = %condition.name, "Mapper condition not met");
            return Ok(false);
        }
    }
    Ok(true)
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Registry of the mappers configured on one connection.
pub struct MapperRegistry {
    connection_id: ConnectionId,
    mappers: HashMap<String, Arc<RegisteredMapper>>,
}

impl MapperRegistry {
    /// Build a registry from definitions and the available engine factories.
    ///
    /// A default `Ditto` mapper is always present unless a definition with
    /// that id overrides it. Every definition is instantiated once to reject
    /// invalid options early.
    pub fn new(
        connection_id: ConnectionId,
        definitions: &BTreeMap<String, MappingDefinition>,
        factories: Vec<Arc<dyn MapperFactory>>,
    ) -> Result<Self, RegistryError> {
        let factories: HashMap<&'static str, Arc<dyn MapperFactory>> =
            factories.into_iter().map(|f| (f.engine(), f)).collect();

        let mut all = definitions.clone();
        all.entry(DEFAULT_MAPPER_ID.to_string())
            .or_insert_with(|| MappingDefinition {
                engine: DEFAULT_MAPPER_ID.to_string(),
                ..MappingDefinition::default()
            });

        let mut mappers = HashMap::with_capacity(all.len());
        for (id, definition) in all {
            let factory = factories
                .get(definition.engine.as_str())
                .cloned()
                .ok_or_else(|| RegistryError::UnknownEngine {
                    id: id.clone(),
                    engine: definition.engine.clone(),
                })?;
            let context = MapperContext {
                id: id.clone(),
                connection_id: connection_id.clone(),
                definition,
            };
            factory.create(&context)?;

            let registered = RegisteredMapper {
                incoming: NamedCondition::parse_all(&id, &context.definition.incoming_conditions),
                outgoing: NamedCondition::parse_all(&id, &context.definition.outgoing_conditions),
                context,
                factory,
            };
            mappers.insert(id, Arc::new(registered));
        }

        debug!(
            connection = %connection_id,
            mappers = mappers.len(),
            "Mapper registry built"
        );
        Ok(Self {
            connection_id,
            mappers,
        })
    }

    /// Registry with the built-in engines only.
    pub fn with_builtins(
        connection_id: ConnectionId,
        definitions: &BTreeMap<String, MappingDefinition>,
    ) -> Result<Self, RegistryError> {
        Self::new(connection_id, definitions, builtin_factories())
    }

    pub fn for_connection(connection: &Connection) -> Result<Self, RegistryError> {
        Self::with_builtins(connection.id().clone(), connection.mapping_definitions())
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mappers.contains_key(id)
    }

    /// Mapper ids to run: `names`, or the default mapper when empty.
    pub fn effective_names(names: &[String]) -> Vec<String> {
        if names.is_empty() {
            vec![DEFAULT_MAPPER_ID.to_string()]
        } else {
            names.to_vec()
        }
    }

    /// Create a fresh instance of mapper `id`.
    pub fn instantiate(&self, id: &str) -> Result<ResolvedMapper, RegistryError> {
        let registered = self
            .mappers
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownMapper(id.to_string()))?;
        let mapper = registered.factory.create(&registered.context)?;
        Ok(ResolvedMapper { registered, mapper })
    }

    /// Resolve an ordered list of names, falling back to the default mapper.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<ResolvedMapper>, RegistryError> {
        Self::effective_names(names)
            .iter()
            .map(|name| self.instantiate(name))
            .collect()
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.mappers.keys().collect();
        ids.sort();
        f.debug_struct("MapperRegistry")
            .field("connection_id", &self.connection_id)
            .field("mappers", &ids)
            .finish()
    }
}
