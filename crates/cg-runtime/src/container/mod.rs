//! # Gateway Container
//!
//! Configuration and the set of running connections.

pub mod config;
pub mod gateway;

pub use config::{load_config, ConfigError, ConnectionConfig, GatewayConfig};
pub use gateway::GatewayContainer;
