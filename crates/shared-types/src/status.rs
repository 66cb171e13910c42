//! HTTP-style status codes carried by responses and acknowledgements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a response or acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const FAILED_DEPENDENCY: StatusCode = StatusCode(424);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// 2xx and 3xx count as success.
    pub const fn is_success(&self) -> bool {
        self.0 < 400
    }

    pub const fn is_timeout(&self) -> bool {
        self.0 == 408
    }

    /// Whether a failure of this status is worth redelivering.
    pub const fn is_retryable(&self) -> bool {
        self.0 == 408 || self.0 == 424 || self.0 >= 500
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StatusCode::NO_CONTENT.is_success());
        assert!(!StatusCode::BAD_REQUEST.is_success());
        assert!(StatusCode::REQUEST_TIMEOUT.is_timeout());
        assert!(StatusCode::SERVICE_UNAVAILABLE.is_retryable());
        assert!(!StatusCode::FORBIDDEN.is_retryable());
    }
}
