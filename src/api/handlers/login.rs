use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    failure,
    types::{Failure, LoginRequest, LoginResponse, SessionUser},
    INTERNAL_ERROR,
};
use crate::account::{AccountError, Accounts};

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields, unknown user or invalid credentials", body = Failure),
        (status = 405, description = "Method not allowed", body = Failure),
        (status = 500, description = "Unexpected failure", body = Failure)
    ),
    tag = "account"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(accounts): Extension<Arc<Accounts>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match accounts
        .login(request.username.as_deref(), request.password.as_deref())
        .await
    {
        Ok((account, session)) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                message: "Login successful".to_string(),
                user: SessionUser {
                    id: account.id,
                    username: account.username,
                    email: account.email,
                    wallet_address: account.wallet_address,
                    balance: account.balance,
                    token: session.access_token,
                },
            }),
        )
            .into_response(),
        Err(
            err @ (AccountError::MissingFields(_)
            | AccountError::NotFound
            | AccountError::InvalidCredentials),
        ) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(err) => {
            error!("Login failed: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}
