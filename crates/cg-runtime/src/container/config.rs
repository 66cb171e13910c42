//! # Gateway Configuration
//!
//! Unified configuration for the processing core and the connections it
//! serves.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file named by `CG_CONFIG`
//! 3. Environment overrides (`CG_MAPPING_PARALLELISM`, `CG_ACK_DEFAULT_TIMEOUT`)

use cg_01_mapping::MappingConfig;
use cg_02_acknowledgements::AcknowledgementsConfig;
use cg_03_dispatch::{DiversionConfig, EnrichmentConfig};
use serde::{Deserialize, Serialize};
use shared_types::{Connection, ConnectionId, LabelError, MappingDefinition, Source, Target};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Names the TOML configuration file.
pub const CONFIG_PATH_VAR: &str = "CG_CONFIG";
pub const PARALLELISM_VAR: &str = "CG_MAPPING_PARALLELISM";
pub const ACK_DEFAULT_TIMEOUT_VAR: &str = "CG_ACK_DEFAULT_TIMEOUT";

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mapping: MappingConfig,
    pub acknowledgements: AcknowledgementsConfig,
    pub enrichment: EnrichmentConfig,
    pub diversion: DiversionConfig,
    pub connections: Vec<ConnectionConfig>,
}

/// One connection as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub id: ConnectionId,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub mapping_definitions: BTreeMap<String, MappingDefinition>,
}

impl ConnectionConfig {
    /// Resolve declared and issued labels into the runtime view.
    pub fn build(&self) -> Result<Connection, ConfigError> {
        Connection::new(
            self.id.clone(),
            self.sources.clone(),
            self.targets.clone(),
            self.mapping_definitions.clone(),
        )
        .map_err(|source| ConfigError::Connection {
            connection: self.id.clone(),
            source,
        })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var}='{value}' is invalid: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("acknowledgements.default_timeout exceeds acknowledgements.max_timeout")]
    TimeoutAboveMax,

    #[error("connection id '{0}' is configured more than once")]
    DuplicateConnection(ConnectionId),

    #[error("connection '{connection}': {source}")]
    Connection {
        connection: ConnectionId,
        #[source]
        source: LabelError,
    },
}

impl GatewayConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Takes a lookup function so tests do not touch the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PARALLELISM_VAR) {
            self.mapping.parallelism =
                value.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidEnv {
                        var: PARALLELISM_VAR,
                        value: value.clone(),
                        reason: e.to_string(),
                    }
                })?;
        }
        if let Some(value) = lookup(ACK_DEFAULT_TIMEOUT_VAR) {
            self.acknowledgements.default_timeout =
                humantime_serde::re::humantime::parse_duration(value.trim()).map_err(|e| {
                    ConfigError::InvalidEnv {
                        var: ACK_DEFAULT_TIMEOUT_VAR,
                        value: value.clone(),
                        reason: e.to_string(),
                    }
                })?;
        }
        Ok(())
    }

    /// Reject configurations the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("mapping.parallelism", self.mapping.parallelism),
            ("mapping.queue_capacity", self.mapping.queue_capacity),
            (
                "mapping.max_mapped_inbound_messages",
                self.mapping.max_mapped_inbound_messages,
            ),
            (
                "mapping.max_mapped_outbound_messages",
                self.mapping.max_mapped_outbound_messages,
            ),
            ("enrichment.cache_capacity", self.enrichment.cache_capacity),
            ("diversion.channel_capacity", self.diversion.channel_capacity),
        ];
        if let Some((field, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }
        if self.acknowledgements.cleanup_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "acknowledgements.cleanup_interval",
            });
        }
        if self.acknowledgements.default_timeout > self.acknowledgements.max_timeout {
            return Err(ConfigError::TimeoutAboveMax);
        }

        let mut seen = std::collections::HashSet::new();
        for connection in &self.connections {
            if !seen.insert(&connection.id) {
                return Err(ConfigError::DuplicateConnection(connection.id.clone()));
            }
            connection.build()?;
        }
        Ok(())
    }
}

/// Load configuration from file and environment.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => GatewayConfig::from_file(Path::new(&path))?,
        Err(_) => GatewayConfig::default(),
    };
    config.apply_overrides(|var| std::env::var(var).ok())?;
    config.validate()?;
    Ok(config)
}
