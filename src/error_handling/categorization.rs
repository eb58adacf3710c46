//! Failure categorization.
//!
//! Maps HTTP statuses and transport errors from the announcement source onto
//! the `FailureType` counters.

use super::types::FailureType;
use crate::config::{
    HTTP_STATUS_BAD_GATEWAY, HTTP_STATUS_GATEWAY_TIMEOUT, HTTP_STATUS_SERVICE_UNAVAILABLE,
    HTTP_STATUS_TOO_MANY_REQUESTS,
};

/// Returns true for the gateway statuses that are retried without a
/// politeness delay.
pub fn is_gateway_status(status: u16) -> bool {
    matches!(
        status,
        HTTP_STATUS_BAD_GATEWAY | HTTP_STATUS_SERVICE_UNAVAILABLE | HTTP_STATUS_GATEWAY_TIMEOUT
    )
}

/// Categorizes a non-200 HTTP status into a `FailureType`.
pub fn categorize_status(status: u16) -> FailureType {
    if status == HTTP_STATUS_TOO_MANY_REQUESTS {
        FailureType::AsnRateLimited
    } else if is_gateway_status(status) {
        FailureType::AsnGatewayError
    } else {
        FailureType::AsnUnexpectedStatus
    }
}

/// Categorizes a `reqwest::Error` raised before a status was available.
///
/// Decode errors mean the body arrived but was unusable; everything else is
/// a transport problem worth retrying.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> FailureType {
    if let Some(status) = error.status() {
        return categorize_status(status.as_u16());
    }
    if error.is_decode() {
        FailureType::AsnParseError
    } else {
        FailureType::AsnTransportError
    }
}
