//! Default protocol mapper.

use crate::error::{MappingError, RegistryError};
use crate::mappers::protocol;
use crate::ports::{MapperContext, MapperFactory, MessageMapper};
use shared_types::{ExternalMessage, Signal};

pub const ENGINE: &str = "Ditto";

/// Maps protocol JSON envelopes one to one.
#[derive(Debug)]
pub struct DittoMapper {
    id: String,
}

impl DittoMapper {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl MessageMapper for DittoMapper {
    fn id(&self) -> &str {
        &self.id
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        protocol::to_signals(message)
    }

    fn map_outbound(&mut self, signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        Ok(vec![protocol::to_external(signal)?])
    }
}

#[derive(Debug, Default)]
pub struct DittoMapperFactory;

impl MapperFactory for DittoMapperFactory {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        Ok(Box::new(DittoMapper::new(context.id.clone())))
    }
}
