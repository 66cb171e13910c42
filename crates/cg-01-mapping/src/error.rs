//! Error types for the mapping subsystem

use shared_types::StatusCode;
use thiserror::Error;

/// A placeholder could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
    #[error("unresolved placeholder '{{{{ {0} }}}}'")]
    Unresolved(String),

    #[error("unknown placeholder '{0}'")]
    Unknown(String),

    #[error("unterminated placeholder in template '{0}'")]
    Unterminated(String),
}

/// A condition or filter expression is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{operator}' expects {expected} arguments")]
    Arity {
        operator: String,
        expected: &'static str,
    },

    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),
}

/// Mapper registry construction or lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no payload mapper is configured with id '{0}'")]
    UnknownMapper(String),

    #[error("payload mapper '{id}' uses unknown engine '{engine}'")]
    UnknownEngine { id: String, engine: String },

    #[error("invalid options for payload mapper '{id}': {reason}")]
    InvalidOptions { id: String, reason: String },
}

/// A single mapper failed to transform a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// Payload is not text/JSON the mapper can read.
    #[error("payload could not be read: {0}")]
    InvalidPayload(String),

    /// Payload was readable but violates the mapper's protocol.
    #[error("protocol violation: {reason}")]
    Protocol {
        topic: Option<String>,
        reason: String,
    },

    #[error("unknown resource path '{path}'")]
    UnknownPath { topic: Option<String>, path: String },

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("condition '{name}' is invalid: {source}")]
    Condition {
        name: String,
        #[source]
        source: ExpressionError,
    },

    #[error("mapper '{mapper}' produced {produced} messages, at most {max} are allowed")]
    TooManyMessages {
        mapper: String,
        produced: usize,
        max: usize,
    },

    #[error("mapper '{mapper}' panicked: {message}")]
    Panicked { mapper: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl MappingError {
    pub fn protocol(topic: Option<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            topic,
            reason: reason.into(),
        }
    }

    /// Protocol topic the failing message was addressed to, when known.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Protocol { topic, .. } | Self::UnknownPath { topic, .. } => topic.as_deref(),
            _ => None,
        }
    }

    /// Status of the error response reporting this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Panicked { .. } | Self::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable error code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) | Self::Protocol { .. } | Self::UnknownPath { .. } => {
                "connectivity:message.mapping.failed"
            }
            Self::Placeholder(_) => "connectivity:placeholder.unresolved",
            Self::Condition { .. } => "connectivity:mapping.condition.invalid",
            Self::TooManyMessages { .. } => "connectivity:mapping.too.many.messages",
            Self::Panicked { .. } => "connectivity:message.mapping.failed",
            Self::Registry(_) => "connectivity:mapper.unknown",
        }
    }
}
