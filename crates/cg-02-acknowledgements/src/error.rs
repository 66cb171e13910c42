//! Error types for response collection.

use thiserror::Error;

/// Failures of the response collector store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    /// A collector for this correlation id is already in flight.
    #[error("a response collector for correlation id '{0}' is already registered")]
    Duplicate(String),

    /// No collector is registered (never was, settled or expired).
    #[error("no response collector for correlation id '{0}'")]
    Unknown(String),

    /// The expected response count was already set.
    #[error("response collector '{key}' is already armed with {expected} expected responses")]
    AlreadyArmed { key: String, expected: usize },
}
