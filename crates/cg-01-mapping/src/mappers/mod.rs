//! Built-in payload mappers.

pub mod ditto;
pub mod duplicate;
pub mod implicit_thing;
pub mod protocol;

use crate::ports::MapperFactory;
use std::sync::Arc;

pub use ditto::{DittoMapper, DittoMapperFactory};
pub use duplicate::{DuplicateMapper, DuplicateMapperFactory};
pub use implicit_thing::{ImplicitThingCreationMapper, ImplicitThingCreationMapperFactory};

/// Id and engine of the mapper used when a source or target names none.
pub const DEFAULT_MAPPER_ID: &str = ditto::ENGINE;

/// Factories for every built-in engine.
pub fn builtin_factories() -> Vec<Arc<dyn MapperFactory>> {
    vec![
        Arc::new(DittoMapperFactory),
        Arc::new(DuplicateMapperFactory),
        Arc::new(ImplicitThingCreationMapperFactory),
    ]
}
