//! # Mapping Outcomes
//!
//! Result of applying one mapper to one message. Consumers match on all three
//! cases; there is no catch-all accessor that hides drops or errors.

use crate::error::MappingError;
use shared_types::ExternalMessage;

/// Outcome of one mapper for one message.
#[derive(Debug, Clone)]
pub enum MappingOutcome<T> {
    /// The mapper produced at least one result.
    Mapped { mapper_id: String, mapped: T },
    /// The mapper found nothing actionable.
    Dropped {
        mapper_id: String,
        message: Option<ExternalMessage>,
    },
    /// The mapper failed.
    Error {
        mapper_id: String,
        error: MappingError,
        topic: Option<String>,
        message: Option<ExternalMessage>,
    },
}

impl<T> MappingOutcome<T> {
    pub fn mapper_id(&self) -> &str {
        match self {
            Self::Mapped { mapper_id, .. }
            | Self::Dropped { mapper_id, .. }
            | Self::Error { mapper_id, .. } => mapper_id,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Transform the mapped value, keeping drops and errors.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MappingOutcome<U> {
        match self {
            Self::Mapped { mapper_id, mapped } => MappingOutcome::Mapped {
                mapper_id,
                mapped: f(mapped),
            },
            Self::Dropped { mapper_id, message } => MappingOutcome::Dropped { mapper_id, message },
            Self::Error {
                mapper_id,
                error,
                topic,
                message,
            } => MappingOutcome::Error {
                mapper_id,
                error,
                topic,
                message,
            },
        }
    }
}

/// Per-kind tally over a sequence of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub mapped: usize,
    pub dropped: usize,
    pub errors: usize,
}

impl OutcomeCounts {
    pub fn of<T>(outcomes: &[MappingOutcome<T>]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, outcome| {
            match outcome {
                MappingOutcome::Mapped { .. } => counts.mapped += 1,
                MappingOutcome::Dropped { .. } => counts.dropped += 1,
                MappingOutcome::Error { .. } => counts.errors += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.mapped + self.dropped + self.errors
    }
}
