//! Protocol mapper that emits every mapped value `count` times.
//!
//! Used to fan a single message out to several signals, mostly in tests and
//! for bridging setups that need the same message twice.

use crate::error::{MappingError, RegistryError};
use crate::mappers::protocol;
use crate::ports::{MapperContext, MapperFactory, MessageMapper};
use shared_types::{ExternalMessage, Signal};

pub const ENGINE: &str = "Duplicate";
const DEFAULT_COUNT: usize = 2;

#[derive(Debug)]
pub struct DuplicateMapper {
    id: String,
    count: usize,
}

impl DuplicateMapper {
    pub fn new(id: impl Into<String>, count: usize) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }
}

impl MessageMapper for DuplicateMapper {
    fn id(&self) -> &str {
        &self.id
    }

    fn map_inbound(&mut self, message: &ExternalMessage) -> Result<Vec<Signal>, MappingError> {
        let signals = protocol::to_signals(message)?;
        Ok(repeat(signals, self.count))
    }

    fn map_outbound(&mut self, signal: &Signal) -> Result<Vec<ExternalMessage>, MappingError> {
        let message = protocol::to_external(signal)?;
        Ok(repeat(vec![message], self.count))
    }
}

fn repeat<T: Clone>(items: Vec<T>, count: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

#[derive(Debug, Default)]
pub struct DuplicateMapperFactory;

impl MapperFactory for DuplicateMapperFactory {
    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn create(&self, context: &MapperContext) -> Result<Box<dyn MessageMapper>, RegistryError> {
        let count = match context.option("count") {
            None => DEFAULT_COUNT,
            Some(value) => value
                .as_u64()
                .and_then(|c| usize::try_from(c).ok())
                .filter(|c| *c > 0)
                .ok_or_else(|| context.invalid_options("'count' must be a positive integer"))?,
        };
        Ok(Box::new(DuplicateMapper::new(context.id.clone(), count)))
    }
}
