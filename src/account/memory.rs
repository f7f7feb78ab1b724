//! In-process collaborators for tests and local runs.
//!
//! They mirror the uniqueness rules and the conditional updates of the hosted
//! services, so the flows behave the same against them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use tokio::sync::Mutex;
use ulid::Ulid;
use uuid::Uuid;

use super::{
    window_start, Account, AccountLedger, CredentialError, CredentialStore, InsertOutcome,
    NewAccount, Session,
};

const MIN_PASSWORD_LEN: usize = 6;

struct Identity {
    id: Uuid,
    password: SecretString,
}

/// Credential Store keeping identities in a map keyed by email.
#[derive(Default)]
pub struct MemoryCredentials {
    identities: Mutex<HashMap<String, Identity>>,
}

impl MemoryCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        _username: &str,
    ) -> Result<Uuid, CredentialError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(CredentialError::Rejected(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let mut identities = self.identities.lock().await;
        let key = email.to_lowercase();
        if identities.contains_key(&key) {
            return Err(CredentialError::Rejected(
                "User already registered".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        identities.insert(
            key,
            Identity {
                id,
                password: SecretString::from(password),
            },
        );
        Ok(id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, CredentialError> {
        let identities = self.identities.lock().await;
        match identities.get(&email.to_lowercase()) {
            Some(identity) if identity.password.expose_secret() == password => Ok(Session {
                access_token: format!("{}.{}", identity.id, Ulid::new()),
            }),
            _ => Err(CredentialError::Rejected(
                "Invalid login credentials".to_string(),
            )),
        }
    }
}

/// Account Ledger keeping rows in a map keyed by id.
#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the stored send time of an outstanding code back by `age`.
    pub async fn age_code(&self, id: Uuid, age: Duration) {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&id) {
            row.verification_sent_at = row.verification_sent_at.map(|sent_at| sent_at - age);
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Account> {
        self.rows.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl AccountLedger for MemoryLedger {
    async fn insert(&self, account: &NewAccount) -> Result<InsertOutcome> {
        let mut rows = self.rows.lock().await;

        if rows
            .values()
            .any(|row| row.wallet_address == account.wallet_address)
        {
            return Ok(InsertOutcome::WalletTaken);
        }
        if rows.contains_key(&account.id)
            || rows
                .values()
                .any(|row| row.username == account.username || row.email == account.email)
        {
            return Ok(InsertOutcome::Conflict(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }

        let row = Account {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            wallet_address: account.wallet_address.clone(),
            balance: account.balance,
            verified: false,
            verification_code: None,
            verification_sent_at: None,
            verified_at: None,
            created_at: Utc::now(),
        };
        rows.insert(row.id, row.clone());
        Ok(InsertOutcome::Created(row))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        let rows = self.rows.lock().await;
        let by_username = rows.values().find(|row| row.username == login);
        let found = by_username.or_else(|| rows.values().find(|row| row.email == login));
        Ok(found.cloned())
    }

    async fn find_by_username_and_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .find(|row| row.username == username && row.email == email)
            .cloned())
    }

    async fn store_code(&self, id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        Ok(rows.get_mut(&id).map_or(false, |row| {
            row.verification_code = Some(code.to_string());
            row.verification_sent_at = Some(sent_at);
            true
        }))
    }

    async fn consume_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Account>> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };

        let matches = row.verification_code.as_deref() == Some(code)
            && row
                .verification_sent_at
                .is_some_and(|sent_at| sent_at >= window_start(now, ttl));
        if !matches {
            return Ok(None);
        }

        row.verified = true;
        row.verified_at = Some(now);
        row.verification_code = None;
        row.verification_sent_at = None;
        Ok(Some(row.clone()))
    }

    async fn clear_code(&self, id: Uuid, code: &str) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&id) {
            if row.verification_code.as_deref() == Some(code) {
                row.verification_code = None;
                row.verification_sent_at = None;
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
