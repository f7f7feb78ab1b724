use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, error, instrument};

use super::{
    client_ip, failure,
    types::{request_meta, Failure, MessageResponse, SendVerificationRequest},
};
use crate::account::{AccountError, Accounts, SendOutcome};

/// The answer is the same whether or not an account matched, so the endpoint
/// cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/api/send-verification",
    request_body = SendVerificationRequest,
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "Missing fields", body = Failure),
        (status = 405, description = "Method not allowed", body = Failure),
        (status = 500, description = "Code could not be stored or sent", body = Failure)
    ),
    tag = "verification"
)]
#[instrument(skip_all)]
pub async fn send_verification(
    Extension(accounts): Extension<Arc<Accounts>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Option<Json<SendVerificationRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let meta = request_meta(
        client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        request.device_info,
    );

    match accounts
        .send_verification(request.username.as_deref(), request.email.as_deref(), &meta)
        .await
    {
        Ok(outcome) => {
            if outcome != SendOutcome::Sent {
                debug!("No code sent: {outcome:?}");
            }
            (
                StatusCode::OK,
                Json(MessageResponse {
                    success: true,
                    message: "Verification code sent successfully".to_string(),
                }),
            )
                .into_response()
        }
        Err(AccountError::MissingFields(message)) => failure(StatusCode::BAD_REQUEST, message),
        Err(AccountError::Storage(err)) => {
            error!("Failed to store verification code: {err:#}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store verification code",
            )
        }
        Err(err) => {
            error!("Failed to send verification email: {err}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send verification email",
            )
        }
    }
}
