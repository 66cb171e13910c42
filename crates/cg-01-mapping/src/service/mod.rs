//! Service Layer - mapper registry and mapping stages

pub mod inbound;
pub mod outbound;
pub mod registry;

pub use inbound::{InboundMappingStage, InboundOutcome};
pub use outbound::{group_targets, OutboundMappingStage, OutboundOutcome, TargetGroup};
pub use registry::{MapperRegistry, ResolvedMapper};

use std::any::Any;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
