//! Ports Layer
//!
//! - `MessageMapper`: a payload transformer instance
//! - `MapperFactory`: creates fresh mapper instances for an engine

pub mod mapper;

pub use mapper::{MapperContext, MapperFactory, MessageMapper};
