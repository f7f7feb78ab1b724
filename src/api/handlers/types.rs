//! Request and response bodies of the account endpoints.
//!
//! Request fields are all optional so a missing field becomes the endpoint's
//! validation message instead of a JSON rejection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::account::{Account, RequestMeta};

#[derive(ToSchema, Deserialize, Default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Default)]
pub struct LoginRequest {
    /// Username or email.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Debug, Default, Clone)]
pub struct DeviceInfo {
    pub device: Option<String>,
    pub os: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SendVerificationRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "deviceInfo")]
    pub device_info: Option<DeviceInfo>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct VerifyCodeRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub code: Option<String>,
}

/// Body of every failed request.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Failure {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub wallet_address: String,
    #[schema(value_type = f64)]
    pub balance: Decimal,
    pub verified: bool,
}

impl From<Account> for RegisteredUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            wallet_address: account.wallet_address,
            balance: account.balance,
            verified: account.verified,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub wallet_address: String,
    #[schema(value_type = f64)]
    pub balance: Decimal,
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: SessionUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifiedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyCodeResponse {
    pub success: bool,
    pub message: String,
    pub user: VerifiedUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PingResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
}

pub(crate) fn request_meta(client_ip: String, device_info: Option<DeviceInfo>) -> RequestMeta {
    let DeviceInfo { device, os } = device_info.unwrap_or_default();
    RequestMeta {
        client_ip,
        device,
        os,
    }
}
