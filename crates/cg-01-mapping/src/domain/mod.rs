//! Domain Layer - pure mapping logic
//!
//! - Placeholder resolution (`{{ thing:id }}`)
//! - Condition and filter expressions
//! - Mapping outcomes
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod config;
pub mod expression;
pub mod outcome;
pub mod placeholders;

pub use config::MappingConfig;
pub use expression::{CompareOp, Expression};
pub use outcome::{MappingOutcome, OutcomeCounts};
pub use placeholders::{entity_view, lookup_path, PlaceholderContext, ValueResolver};
