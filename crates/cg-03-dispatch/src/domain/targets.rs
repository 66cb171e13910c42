//! Target selection and per-target address and header resolution.

use cg_01_mapping::{Expression, PlaceholderContext, PlaceholderError};
use shared_types::{ExternalMessage, FilteredTopic, HeaderMapping, Headers};
use tracing::warn;

/// Whether `subscription`'s filter admits the signal in `ctx`.
///
/// A filter that does not parse or evaluate excludes the target.
pub fn filter_admits(subscription: &FilteredTopic, ctx: &PlaceholderContext<'_>) -> bool {
    let Some(filter) = subscription.filter.as_deref() else {
        return true;
    };
    match Expression::parse(filter).map(|e| e.evaluate(ctx)) {
        Ok(Ok(admitted)) => admitted,
        Ok(Err(e)) => {
            warn!(filter = %filter, error = %e, "Target filter could not be evaluated");
            false
        }
        Err(e) => {
            warn!(filter = %filter, error = %e, "Target filter is invalid");
            false
        }
    }
}

/// Resolve a header mapping.
///
/// Entries whose placeholders have no value are omitted; unknown or
/// malformed placeholders fail the whole mapping.
pub fn resolve_header_mapping(
    mapping: &HeaderMapping,
    ctx: &PlaceholderContext<'_>,
) -> Result<Headers, PlaceholderError> {
    let mut headers = Headers::new();
    for (name, template) in mapping.iter() {
        match ctx.resolve_template(template) {
            Ok(value) => headers.insert(name, value),
            Err(PlaceholderError::Unresolved(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(headers)
}

/// A mapped message ready for one destination.
#[derive(Debug, Clone)]
pub struct Addressed {
    pub address: String,
    pub message: ExternalMessage,
}

/// Resolve `address` and header mapping for every mapped message.
pub fn address_messages(
    address: &str,
    header_mapping: &HeaderMapping,
    messages: &[ExternalMessage],
    ctx: &PlaceholderContext<'_>,
) -> Result<Vec<Addressed>, PlaceholderError> {
    let address = ctx.resolve_template(address)?;
    let mapped_headers = resolve_header_mapping(header_mapping, ctx)?;
    Ok(messages
        .iter()
        .map(|message| Addressed {
            address: address.clone(),
            message: message.with_headers(message.headers().merged(&mapped_headers)),
        })
        .collect())
}
