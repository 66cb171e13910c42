//! # Error Types
//!
//! Defines error types used across pipeline stages.

use thiserror::Error;

/// A header value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The header exists but its value is not parseable.
    #[error("invalid value for header '{key}': '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl HeaderError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// An acknowledgement label is malformed or not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// Label does not match the allowed character set or length.
    #[error("invalid acknowledgement label: '{0}'")]
    Invalid(String),

    /// A declared label of a connection is not prefixed by the connection id.
    #[error("declared acknowledgement label '{label}' must be prefixed by connection id '{connection}'")]
    NotPrefixed { label: String, connection: String },

    /// A label refers to no source declaration of the owning connection.
    #[error("acknowledgement label '{0}' is not declared by any source")]
    Undeclared(String),

    /// Two targets of one connection issue the same label.
    #[error("acknowledgement label '{0}' is issued by more than one target")]
    DuplicateIssued(String),
}

/// Identifier parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Entity ids have the form `namespace:name`.
    #[error("invalid entity id: '{0}'")]
    InvalidEntityId(String),

    /// Connection ids are 1..=100 characters of `[A-Za-z0-9_.:-]`.
    #[error("invalid connection id: '{0}'")]
    InvalidConnectionId(String),
}
