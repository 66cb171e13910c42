//! Diversion preconditions. Pure function of the response headers.

use shared_types::{headers::split_list, keys, ConnectionId, ResponseType, Signal};

const DEFAULT_EXPECTED: [ResponseType; 2] = [ResponseType::Response, ResponseType::Error];

/// The connection `response` should be diverted to, if any.
///
/// `None` when the response is not command-response shaped, was already
/// diverted, names no valid foreign connection, or its response type is not
/// among the expected ones (default `response,error`).
pub fn diversion_target(response: &Signal, own_connection: &ConnectionId) -> Option<ConnectionId> {
    let response_type = response.response_type()?;
    let headers = response.headers();
    if headers.contains(keys::DIVERTED_RESPONSE_FROM_CONNECTION) {
        return None;
    }

    let target = ConnectionId::parse(headers.get(keys::DIVERT_RESPONSE_TO_CONNECTION)?.trim()).ok()?;
    if &target == own_connection {
        return None;
    }

    let expected: Vec<ResponseType> = match headers.get(keys::DIVERT_EXPECTED_RESPONSE_TYPES) {
        Some(raw) => split_list(raw).filter_map(ResponseType::parse).collect(),
        None => DEFAULT_EXPECTED.to_vec(),
    };
    expected.contains(&response_type).then_some(target)
}
