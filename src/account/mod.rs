//! Account flows and the collaborators they run against.
//!
//! Every endpoint maps onto one flow implemented on [`Accounts`]:
//!
//! - **Provisioning** (`register`): Credential Store account, ledger row with a fresh
//!   wallet address and starting balance, then a verification code.
//! - **Session** (`login`): ledger lookup by username or email, password check and
//!   session token from the Credential Store.
//! - **Verification** (`send_verification`, `verify`): the code lifecycle
//!   `Unverified -> CodePending -> Verified`, with `ExpiredPending` once the window
//!   has elapsed.
//!
//! The collaborators are trait objects so the same flows run against the hosted
//! services in production and against [`memory`] implementations in tests.

mod credentials;
mod error;
#[cfg(test)]
mod flow_tests;
mod ledger;
pub mod memory;
mod provisioning;
mod session;
mod verification;

use crate::mail::MailDispatcher;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub use credentials::{CredentialError, CredentialStore, GoTrueCredentials, Session};
pub use error::AccountError;
pub use ledger::{AccountLedger, InsertOutcome, PgLedger};
pub use provisioning::{generate_wallet_address, WALLET_PREFIX};
pub use verification::{
    generate_code, is_expired, window_start, RequestMeta, SendOutcome, VerificationState,
};

const DEFAULT_CODE_TTL_SECONDS: i64 = 10 * 60;
/// Longest accepted verification window, one day.
pub const MAX_CODE_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_STARTING_BALANCE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Account row as stored in the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub wallet_address: String,
    pub balance: Decimal,
    pub verified: bool,
    pub verification_code: Option<String>,
    pub verification_sent_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields written when provisioning a new ledger row.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub wallet_address: String,
    pub balance: Decimal,
}

#[derive(Clone, Debug)]
pub struct AccountConfig {
    code_ttl_seconds: i64,
    starting_balance: Decimal,
}

impl AccountConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds.clamp(1, MAX_CODE_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_starting_balance(mut self, balance: Decimal) -> Self {
        self.starting_balance = balance;
        self
    }

    #[must_use]
    pub fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        Duration::try_seconds(self.code_ttl_seconds)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_CODE_TTL_SECONDS))
    }

    #[must_use]
    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide handle to the collaborators, shared by every request.
pub struct Accounts {
    config: AccountConfig,
    credentials: Arc<dyn CredentialStore>,
    ledger: Arc<dyn AccountLedger>,
    mailer: Arc<dyn MailDispatcher>,
}

impl Accounts {
    pub fn new(
        config: AccountConfig,
        credentials: Arc<dyn CredentialStore>,
        ledger: Arc<dyn AccountLedger>,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        Self {
            config,
            credentials,
            ledger,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &dyn AccountLedger {
        self.ledger.as_ref()
    }

    pub(crate) fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub(crate) fn mailer(&self) -> &dyn MailDispatcher {
        self.mailer.as_ref()
    }
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Request fields count as missing when absent or empty.
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
