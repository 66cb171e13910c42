//! Mapper ports.
//!
//! A mapper instance is created for one pipeline run and never shared between
//! concurrently mapped messages, so implementations may keep per-run state in
//! `&mut self` without synchronisation.

use crate::error::{MappingError, RegistryError};
use shared_types::{ConnectionId, ExternalMessage, MappingDefinition, Signal};

/// A bidirectional payload transformer.
///
/// Returning an empty vector means the message was dropped.
pub trait MessageMapper: Send {
    fn id(&self) -> &str;

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError>;

    fn map_outbound(&mut self, signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError>;
}

/// What a factory gets to build one mapper instance.
#[derive(Debug, Clone)]
pub struct MapperContext {
    pub id: String,
    pub connection_id: ConnectionId,
    pub definition: MappingDefinition,
}

impl MapperContext {
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.definition.options.get(key)
    }

    pub fn invalid_options(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::InvalidOptions {
            id: self.id.clone(),
            reason: reason.into(),
        }
    }
}

/// Creates mapper instances for one engine.
pub trait MapperFactory: Send + Sync {
    /// Engine name referenced by `MappingDefinition::engine`.
    fn engine(&self) -> &'static str;

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError>;
}
