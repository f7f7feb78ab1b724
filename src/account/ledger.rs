//! Account Ledger: the `users` table holding wallet and verification state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{window_start, Account, NewAccount};

const WALLET_ADDRESS_CONSTRAINT: &str = "users_wallet_address_key";

/// Outcome of inserting a freshly provisioned account row.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Account),
    /// The generated wallet address already exists; the caller may retry with a new one.
    WalletTaken,
    /// Username, email or id collided with an existing row.
    Conflict(String),
}

/// Storage capabilities the account flows need.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn insert(&self, account: &NewAccount) -> Result<InsertOutcome>;

    /// Find an account whose username or email equals `login`.
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;

    async fn find_by_username_and_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>>;

    /// Overwrite the outstanding code; returns `false` if no row matched.
    async fn store_code(&self, id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<bool>;

    /// Mark the account verified and clear the code, but only if `code` is still the
    /// stored one and was sent no longer than `ttl` before `now`.
    ///
    /// Returns the updated row, or `None` when the condition did not hold.
    async fn consume_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Account>>;

    /// Clear an outstanding code if it is still `code`.
    async fn clear_code(&self, id: Uuid, code: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// `PostgreSQL` ledger.
#[derive(Clone, Debug)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        wallet_address: row.get("wallet_address"),
        balance: row.get("balance"),
        verified: row.get("verified"),
        verification_code: row.get("verification_code"),
        verification_sent_at: row.get("verification_sent_at"),
        verified_at: row.get("verified_at"),
        created_at: row.get("created_at"),
    }
}

/// Classify a failed insert: `Some` when it was a unique violation.
fn insert_conflict(err: &sqlx::Error) -> Option<InsertOutcome> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    if db_err.constraint() == Some(WALLET_ADDRESS_CONSTRAINT) {
        Some(InsertOutcome::WalletTaken)
    } else {
        Some(InsertOutcome::Conflict(db_err.message().to_string()))
    }
}

#[async_trait]
impl AccountLedger for PgLedger {
    async fn insert(&self, account: &NewAccount) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users
                (id, username, email, wallet_address, balance, verified)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id, username, email, wallet_address, balance, verified,
                verification_code, verification_sent_at, verified_at, created_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.wallet_address)
            .bind(account.balance)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(InsertOutcome::Created(account_from_row(&row))),
            Err(err) => match insert_conflict(&err) {
                Some(outcome) => Ok(outcome),
                None => Err(err).context("failed to insert account"),
            },
        }
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        // Prefer the username match when one value hits two rows.
        let query = r"
            SELECT id, username, email, wallet_address, balance, verified,
                verification_code, verification_sent_at, verified_at, created_at
            FROM users
            WHERE username = $1 OR email = $1
            ORDER BY (username = $1) DESC
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(login)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by login")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_username_and_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let query = r"
            SELECT id, username, email, wallet_address, balance, verified,
                verification_code, verification_sent_at, verified_at, created_at
            FROM users
            WHERE username = $1 AND email = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by username and email")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn store_code(&self, id: Uuid, code: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let query = r"
            UPDATE users
            SET verification_code = $2,
                verification_sent_at = $3
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(code)
            .bind(sent_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store verification code")?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Account>> {
        // Check and clear happen in one statement so a code is consumed at most once.
        let query = r"
            UPDATE users
            SET verified = TRUE,
                verified_at = $3,
                verification_code = NULL,
                verification_sent_at = NULL
            WHERE id = $1
              AND verification_code = $2
              AND verification_sent_at >= $4
            RETURNING id, username, email, wallet_address, balance, verified,
                verification_code, verification_sent_at, verified_at, created_at
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(code)
            .bind(now)
            .bind(window_start(now, ttl))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume verification code")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn clear_code(&self, id: Uuid, code: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET verification_code = NULL,
                verification_sent_at = NULL
            WHERE id = $1 AND verification_code = $2
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(code)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to clear verification code")?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}
