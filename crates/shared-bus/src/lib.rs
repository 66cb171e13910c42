//! # Shared Bus - Diverted Response Pub/Sub
//!
//! Carries responses that one connection diverts to another connection.
//!
//! ```text
//! ┌──────────────┐                          ┌──────────────┐
//! │ Connection A │                          │ Connection B │
//! │              │ publish_response_for_    │              │
//! │              │ diversion() ─────┐       │              │
//! └──────────────┘                  │       └──────────────┘
//!                                   ▼              ↑
//!                             ┌──────────────┐     │
//!                             │ Diversion Bus│ ────┘
//!                             └──────────────┘  subscribe_for_diverted_responses(B)
//! ```
//!
//! A subscription only ever yields responses addressed to its own connection.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{DivertedResponse, DiversionFilter};
pub use publisher::{DiversionPublisher, InMemoryDiversionBus};
pub use subscriber::{DivertedResponseStream, Subscription, SubscriptionError};

/// Maximum diverted responses buffered per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
