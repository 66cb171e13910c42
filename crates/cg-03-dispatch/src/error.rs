//! Error types for dispatching.

use cg_01_mapping::{ExpressionError, MappingError, PlaceholderError};
use cg_02_acknowledgements::CollectorError;
use shared_types::{AckLabel, EntityId, HeaderError, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// A mapped signal cannot be dispatched.
///
/// Every variant except `Collector` and `PoolClosed` is reported back to the
/// sender as an error response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("acknowledgement label '{0}' is not declared by any source of this connection")]
    UndeclaredLabel(AckLabel),

    #[error("enforcement failed: '{input}' matches none of the configured filters")]
    EnforcementFailed { input: String },

    #[error("acknowledgement filter is invalid: {0}")]
    AckFilter(#[from] ExpressionError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("mapping worker pool is shut down")]
    PoolClosed,

    #[error("mapping worker queue is full")]
    QueueFull,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EnforcementFailed { .. } => StatusCode::FORBIDDEN,
            Self::Mapping(e) => e.status(),
            Self::Collector(_) | Self::PoolClosed | Self::QueueFull => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Error code of the error response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Header(_) => "gateway:header.invalid",
            Self::UndeclaredLabel(_) => "acknowledgement:label.not.declared",
            Self::EnforcementFailed { .. } => "connectivity:connection.id.enforcement.failed",
            Self::AckFilter(_) => "connectivity:acknowledgement.filter.invalid",
            Self::Placeholder(_) => "connectivity:placeholder.unresolved",
            Self::Mapping(e) => e.code(),
            Self::Collector(_) | Self::PoolClosed | Self::QueueFull => {
                "connectivity:dispatch.unavailable"
            }
        }
    }
}

/// Transport-level failure of one publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publishing to '{address}' failed: {reason}")]
    Transport { address: String, reason: String },

    #[error("'{address}' rejected the message with {status}: {reason}")]
    Rejected {
        address: String,
        status: StatusCode,
        reason: String,
    },

    #[error("publishing to '{address}' timed out")]
    Timeout { address: String },
}

impl PublishError {
    /// Status of the failed acknowledgement for this publish.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Transport { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rejected { status, .. } => *status,
            Self::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

/// Retrieving extra fields for a signal failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("entity '{0}' not found or not readable")]
    NotFound(EntityId),

    #[error("retrieving extra fields failed with {status}")]
    Failed { status: StatusCode },

    #[error("retrieving extra fields timed out after {0:?}")]
    Timeout(Duration),

    #[error("enrichment unavailable: {0}")]
    Unavailable(String),
}

impl EnrichmentError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Failed { status } => *status,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses() {
        assert_eq!(
            DispatchError::EnforcementFailed { input: "x".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DispatchError::UndeclaredLabel(AckLabel::parse("conn:x").unwrap()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PublishError::Timeout { address: "a".into() }.status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert!(EnrichmentError::Unavailable("down".into()).status().is_retryable());
    }
}
