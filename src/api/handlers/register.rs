use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, instrument};

use super::{
    client_ip, failure,
    types::{Failure, RegisterRequest, RegisterResponse, RegisteredUser},
    INTERNAL_ERROR,
};
use crate::account::{AccountError, Accounts, RequestMeta};

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Missing fields or rejected by the credential store or ledger", body = Failure),
        (status = 405, description = "Method not allowed", body = Failure),
        (status = 500, description = "Verification email could not be sent", body = Failure)
    ),
    tag = "account"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(accounts): Extension<Arc<Accounts>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let meta = RequestMeta {
        client_ip: client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)),
        ..RequestMeta::default()
    };

    let result = accounts
        .register(
            request.username.as_deref(),
            request.email.as_deref(),
            request.password.as_deref(),
            &meta,
        )
        .await;

    match result {
        Ok(account) => (
            StatusCode::OK,
            Json(RegisterResponse {
                success: true,
                message: "Registration successful. Please check your email for verification code."
                    .to_string(),
                user: RegisteredUser::from(account),
            }),
        )
            .into_response(),
        Err(AccountError::MissingFields(message)) => failure(StatusCode::BAD_REQUEST, message),
        Err(AccountError::Rejected(message)) => failure(StatusCode::BAD_REQUEST, message),
        Err(AccountError::Storage(err)) => {
            error!("Failed to store account: {err:#}");
            failure(StatusCode::BAD_REQUEST, "Failed to create account")
        }
        Err(err) => {
            error!("Registration failed: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}
