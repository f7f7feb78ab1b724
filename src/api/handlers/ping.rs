use axum::{
    http::{Method, Uri},
    response::Json,
};
use chrono::Utc;

use super::types::PingResponse;

/// Liveness probe answering any method.
#[utoipa::path(
    get,
    path = "/api/test",
    responses(
        (status = 200, description = "API is up", body = PingResponse)
    ),
    tag = "health"
)]
pub async fn ping(method: Method, uri: Uri) -> Json<PingResponse> {
    Json(PingResponse {
        success: true,
        message: "API is working!".to_string(),
        timestamp: Utc::now(),
        method: method.to_string(),
        url: uri.to_string(),
    })
}
