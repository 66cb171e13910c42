//! # Integration Scenarios
//!
//! Each module drives the public APIs of the processing crates together,
//! the way the runtime wires them.

pub mod fixtures;

mod collector_flows;
mod diversion_flows;
mod mapping_flows;
mod outbound_flows;
