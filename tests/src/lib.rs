//! # Connectivity Gateway Test Suite
//!
//! Cross-crate scenarios and properties of the processing core.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── fixtures.rs         # Connections, messages, custom mapper engines
//! │   ├── mapping_flows.rs    # Inbound mapping pipeline
//! │   ├── outbound_flows.rs   # Target grouping and acknowledgements
//! │   ├── collector_flows.rs  # Response collection and admission
//! │   └── diversion_flows.rs  # Response diversion between connections
//! │
//! └── benches/
//!     └── mapping_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cg-tests
//!
//! # One area
//! cargo test -p cg-tests integration::outbound_flows::
//!
//! # Benchmarks
//! cargo bench -p cg-tests
//! ```

#![allow(dead_code)]

pub mod integration;
