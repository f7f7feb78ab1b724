//! Route handlers and the helpers they share.
//!
//! Every failure answers `{"success": false, "message": ...}`; 5xx details stay
//! in the logs.

pub mod health;
pub mod login;
pub mod ping;
pub mod register;
pub mod send_verification;
pub mod types;
pub mod verify_code;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::net::SocketAddr;

use types::Failure;

pub(crate) const INTERNAL_ERROR: &str = "Internal server error";
const UNKNOWN_CLIENT: &str = "unknown";

pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(Failure {
            success: false,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Fallback for every method an account endpoint does not accept.
pub async fn method_not_allowed() -> Response {
    failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// First `x-forwarded-for` entry, then `x-real-ip`, then the TCP peer.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
