//! Domain Layer - dispatch rules
//!
//! - Inbound admission and acknowledgement-request filtering
//! - Diversion preconditions
//! - Target filters, addresses and header mappings
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod admission;
pub mod config;
pub mod diversion;
pub mod targets;

pub use admission::{admit, AdmittedSignal};
pub use config::{DiversionConfig, EnrichmentConfig};
pub use diversion::diversion_target;
pub use targets::{address_messages, filter_admits, resolve_header_mapping, Addressed};
