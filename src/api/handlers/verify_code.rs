use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    failure,
    types::{Failure, VerifiedUser, VerifyCodeRequest, VerifyCodeResponse},
};
use crate::account::{AccountError, Accounts};

#[utoipa::path(
    post,
    path = "/api/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Email verified", body = VerifyCodeResponse),
        (status = 400, description = "Missing fields, invalid or expired code", body = Failure),
        (status = 404, description = "User not found", body = Failure),
        (status = 405, description = "Method not allowed", body = Failure),
        (status = 500, description = "Verification could not be recorded", body = Failure)
    ),
    tag = "verification"
)]
#[instrument(skip_all)]
pub async fn verify_code(
    Extension(accounts): Extension<Arc<Accounts>>,
    payload: Option<Json<VerifyCodeRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    match accounts
        .verify(
            request.username.as_deref(),
            request.email.as_deref(),
            request.code.as_deref(),
        )
        .await
    {
        Ok(account) => (
            StatusCode::OK,
            Json(VerifyCodeResponse {
                success: true,
                message: "Email verified successfully".to_string(),
                user: VerifiedUser {
                    id: account.id,
                    username: account.username,
                    email: account.email,
                    verified: account.verified,
                },
            }),
        )
            .into_response(),
        Err(AccountError::NotFound) => {
            failure(StatusCode::NOT_FOUND, AccountError::NotFound.to_string())
        }
        Err(
            err @ (AccountError::MissingFields(_)
            | AccountError::InvalidCode
            | AccountError::Expired),
        ) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(AccountError::Storage(err)) => {
            error!("Failed to verify user: {err:#}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify user")
        }
        Err(err) => {
            error!("Verification failed: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify code")
        }
    }
}
