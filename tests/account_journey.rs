//! Register, verify and log in through the HTTP router.

use anyhow::{anyhow, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use prdt::{
    account::{
        memory::{MemoryCredentials, MemoryLedger},
        AccountConfig, Accounts,
    },
    api,
    mail::MemoryMailDispatcher,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct Service {
    app: Router,
    ledger: Arc<MemoryLedger>,
    mailer: Arc<MemoryMailDispatcher>,
}

impl Service {
    fn new() -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let mailer = Arc::new(MemoryMailDispatcher::new());
        let accounts = Arc::new(Accounts::new(
            AccountConfig::new(),
            Arc::new(MemoryCredentials::new()),
            ledger.clone(),
            mailer.clone(),
        ));
        Self {
            app: api::router(accounts),
            ledger,
            mailer,
        }
    }

    async fn post(&self, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    async fn stored_code(&self, id: Uuid) -> Result<String> {
        self.ledger
            .get(id)
            .await
            .and_then(|row| row.verification_code)
            .ok_or_else(|| anyhow!("no verification code stored"))
    }
}

fn is_wallet_address(value: &str) -> bool {
    let parts: Vec<&str> = value.splitn(3, '_').collect();
    matches!(parts.as_slice(), [prefix, millis, suffix]
        if *prefix == "PRDT"
            && !millis.is_empty()
            && millis.chars().all(|c| c.is_ascii_digit())
            && suffix.len() == 9
            && suffix.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn alice() -> Value {
    json!({ "username": "alice", "email": "a@x.com", "password": "Secret123!" })
}

#[tokio::test]
async fn register_verify_login() -> Result<()> {
    let service = Service::new();

    let (status, body) = service.post("/api/register", alice()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["user"]["username"], json!("alice"));
    assert_eq!(body["user"]["verified"], json!(false));
    let wallet = body["user"]["wallet_address"].as_str().unwrap_or_default();
    assert!(is_wallet_address(wallet), "{wallet}");

    let id: Uuid = body["user"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("missing id"))?
        .parse()?;
    let code = service.stored_code(id).await?;

    let sent = service.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "PRDT Token - Account Verification Required");
    assert!(sent[0].text.contains(&code));

    let (status, body) = service
        .post(
            "/api/verify-code",
            json!({ "username": "alice", "email": "a@x.com", "code": code }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Email verified successfully"));
    assert_eq!(body["user"]["verified"], json!(true));

    let (status, body) = service
        .post(
            "/api/verify-code",
            json!({ "username": "alice", "email": "a@x.com", "code": code }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid verification code"));

    let (status, body) = service
        .post(
            "/api/login",
            json!({ "username": "alice", "password": "Secret123!" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Login successful"));
    assert_eq!(body["user"]["wallet_address"], json!(wallet));
    assert!(body["user"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn wrong_code_is_rejected_and_account_stays_unverified() -> Result<()> {
    let service = Service::new();
    let (_, body) = service.post("/api/register", alice()).await?;
    let id: Uuid = body["user"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("missing id"))?
        .parse()?;

    let code = service.stored_code(id).await?;
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let (status, body) = service
        .post(
            "/api/verify-code",
            json!({ "username": "alice", "email": "a@x.com", "code": wrong }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "success": false, "message": "Invalid verification code" })
    );
    assert_eq!(service.stored_code(id).await?, code);
    Ok(())
}

#[tokio::test]
async fn expired_code_is_rejected() -> Result<()> {
    let service = Service::new();
    let (_, body) = service.post("/api/register", alice()).await?;
    let id: Uuid = body["user"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("missing id"))?
        .parse()?;
    let code = service.stored_code(id).await?;

    service
        .ledger
        .age_code(id, chrono::Duration::minutes(10) + chrono::Duration::seconds(1))
        .await;

    let (status, body) = service
        .post(
            "/api/verify-code",
            json!({ "username": "alice", "email": "a@x.com", "code": code }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Verification code has expired"));

    let (status, _) = service
        .post(
            "/api/send-verification",
            json!({ "username": "alice", "email": "a@x.com" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let fresh = service.stored_code(id).await?;
    let (status, _) = service
        .post(
            "/api/verify-code",
            json!({ "username": "alice", "email": "a@x.com", "code": fresh }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_rejected() -> Result<()> {
    let service = Service::new();
    let (status, _) = service.post("/api/register", alice()).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = service.post("/api/register", alice()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("User already registered"));
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password() -> Result<()> {
    let service = Service::new();
    service.post("/api/register", alice()).await?;

    let (status, body) = service
        .post(
            "/api/login",
            json!({ "username": "a@x.com", "password": "not-it" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid credentials"));
    Ok(())
}
