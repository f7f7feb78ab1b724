//! Credential Store: identity records, password checks and session tokens.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use url::Url;
use uuid::Uuid;

use crate::APP_USER_AGENT;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FALLBACK_REJECTION: &str = "Authentication request was rejected";

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The store answered and declined (duplicate email, wrong password, ...).
    #[error("{0}")]
    Rejected(String),
    #[error("credential store unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

/// Session issued by the Credential Store after a successful password check.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .finish()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create an identity and return its user id.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Uuid, CredentialError>;

    /// Check the password and issue a session.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, CredentialError>;
}

/// GoTrue-compatible REST client (`/auth/v1/signup`, `/auth/v1/token`).
#[derive(Clone)]
pub struct GoTrueCredentials {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl GoTrueCredentials {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid auth URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build credential store client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid credential store path: {path}"))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, CredentialError> {
        let url = self.endpoint(path).map_err(CredentialError::Unavailable)?;
        let span = info_span!("auth.request", http.method = "POST", http.url = url.as_str());

        let response = self
            .client
            .post(url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .instrument(span)
            .await
            .context("credential store request failed")
            .map_err(CredentialError::Unavailable)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .context("invalid credential store response")
                .map_err(CredentialError::Unavailable);
        }

        let body = response.json::<Value>().await.unwrap_or_default();
        debug!("credential store rejected request: {status}");

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CredentialError::Unavailable(anyhow!(
                "credential store returned {status}: {}",
                rejection_message(&body)
            )));
        }

        Err(CredentialError::Rejected(rejection_message(&body)))
    }
}

impl std::fmt::Debug for GoTrueCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueCredentials")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for GoTrueCredentials {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Uuid, CredentialError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "username": username },
        });
        let response = self.post("auth/v1/signup", &body).await?;

        signup_user_id(&response).ok_or_else(|| {
            CredentialError::Unavailable(anyhow!("credential store returned no user id"))
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, CredentialError> {
        let body = json!({
            "email": email,
            "password": password,
        });
        let response = self
            .post("auth/v1/token?grant_type=password", &body)
            .await?;

        response
            .get("access_token")
            .and_then(Value::as_str)
            .map(|token| Session {
                access_token: token.to_string(),
            })
            .ok_or_else(|| {
                CredentialError::Unavailable(anyhow!("credential store returned no access token"))
            })
    }
}

/// Signup answers with the user object, or with `{user, session}` when
/// auto-confirm is on.
fn signup_user_id(body: &Value) -> Option<Uuid> {
    body.get("user")
        .and_then(|user| user.get("id"))
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn rejection_message(body: &Value) -> String {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .unwrap_or(FALLBACK_REJECTION)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_user_id_reads_nested_and_flat_shapes() {
        let id = Uuid::new_v4();
        let nested = json!({ "user": { "id": id.to_string() }, "session": null });
        let flat = json!({ "id": id.to_string(), "email": "a@x.com" });

        assert_eq!(signup_user_id(&nested), Some(id));
        assert_eq!(signup_user_id(&flat), Some(id));
        assert_eq!(signup_user_id(&json!({ "id": "not-a-uuid" })), None);
        assert_eq!(signup_user_id(&json!({})), None);
    }

    #[test]
    fn rejection_message_prefers_msg() {
        let body = json!({
            "code": 422,
            "error_code": "user_already_exists",
            "msg": "User already registered",
        });
        assert_eq!(rejection_message(&body), "User already registered");
    }

    #[test]
    fn rejection_message_falls_back() {
        let body = json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" });
        assert_eq!(rejection_message(&body), "Invalid login credentials");
        assert_eq!(rejection_message(&Value::Null), FALLBACK_REJECTION);
        assert_eq!(rejection_message(&json!({ "msg": "" })), FALLBACK_REJECTION);
    }

    #[test]
    fn endpoint_keeps_base_path() -> anyhow::Result<()> {
        let store = GoTrueCredentials::new(
            "https://project.supabase.co",
            SecretString::from("anon-key"),
        )?;
        assert_eq!(
            store.endpoint("auth/v1/signup")?.as_str(),
            "https://project.supabase.co/auth/v1/signup"
        );

        let store =
            GoTrueCredentials::new("http://localhost:9999/gateway", SecretString::from("key"))?;
        assert_eq!(
            store.endpoint("auth/v1/token?grant_type=password")?.as_str(),
            "http://localhost:9999/gateway/auth/v1/token?grant_type=password"
        );
        Ok(())
    }

    #[test]
    fn debug_redacts_api_key() -> anyhow::Result<()> {
        let store = GoTrueCredentials::new(
            "https://project.supabase.co",
            SecretString::from("super-secret"),
        )?;
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("super-secret"));
        Ok(())
    }
}
