//! Verification code lifecycle.
//!
//! A code is generated, stored on the row with its send time and emailed. Verifying
//! compares the submitted value with the stored one, checks the window, then consumes
//! the code with a single conditional ledger update. Sending again overwrites the
//! previous code, which invalidates it.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use tracing::{debug, error, info, instrument};

use super::{present, Account, AccountError, Accounts};
use crate::mail::template::{verification_email, VerificationNotice};

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Where the verification state of an account stands at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationState {
    Unverified,
    CodePending,
    /// A code is stored but its window has elapsed; only a fresh send helps.
    ExpiredPending,
    Verified,
}

impl VerificationState {
    #[must_use]
    pub fn of(account: &Account, now: DateTime<Utc>, ttl: Duration) -> Self {
        if account.verified {
            return Self::Verified;
        }
        match (&account.verification_code, account.verification_sent_at) {
            (None, _) => Self::Unverified,
            (Some(_), Some(sent_at)) if !is_expired(sent_at, now, ttl) => Self::CodePending,
            (Some(_), _) => Self::ExpiredPending,
        }
    }
}

/// Request details echoed in the verification email.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub client_ip: String,
    pub device: Option<String>,
    pub os: Option<String>,
}

/// Result of a send-verification request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No account matches the username/email pair; nothing is sent.
    NoAccount,
    AlreadyVerified,
}

/// Six decimal digits drawn uniformly from `[100000, 999999]`.
#[must_use]
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Expired when strictly more than `ttl` has elapsed since `sent_at`.
#[must_use]
pub fn is_expired(sent_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - sent_at > ttl
}

/// Oldest send time still inside the window ending at `now`.
///
/// Saturates at the earliest representable instant instead of overflowing.
#[must_use]
pub fn window_start(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Accounts {
    /// Send a fresh code to the account matching `username` and `email`.
    ///
    /// # Errors
    /// `MissingFields` on empty input, `Storage` if the code cannot be persisted,
    /// `Delivery` if the email cannot be sent.
    #[instrument(skip(self, meta))]
    pub async fn send_verification(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<SendOutcome, AccountError> {
        let (Some(username), Some(email)) = (present(username), present(email)) else {
            return Err(AccountError::MissingFields("Username and email are required"));
        };

        let account = self
            .ledger()
            .find_by_username_and_email(username, email)
            .await
            .map_err(AccountError::Storage)?;

        let Some(account) = account else {
            debug!("No account for verification request");
            return Ok(SendOutcome::NoAccount);
        };

        if account.verified {
            debug!("Account already verified, no code sent");
            return Ok(SendOutcome::AlreadyVerified);
        }

        self.issue_code(&account, meta).await?;

        Ok(SendOutcome::Sent)
    }

    /// Store a new code on the row, then email it.
    ///
    /// Persisting first means a code can only be verified once both steps succeeded:
    /// if delivery fails, nobody knows the stored code and the next send replaces it.
    pub(super) async fn issue_code(
        &self,
        account: &Account,
        meta: &RequestMeta,
    ) -> Result<(), AccountError> {
        let code = generate_code();
        let sent_at = Utc::now();

        let stored = self
            .ledger()
            .store_code(account.id, &code, sent_at)
            .await
            .map_err(AccountError::Storage)?;
        if !stored {
            return Err(AccountError::Storage(anyhow::anyhow!(
                "account {} vanished before the code was stored",
                account.id
            )));
        }

        let notice = VerificationNotice {
            username: &account.username,
            email: &account.email,
            code: &code,
            client_ip: &meta.client_ip,
            device: meta.device.as_deref(),
            os: meta.os.as_deref(),
            sent_at,
            validity: self.config().code_ttl(),
        };

        self.mailer()
            .dispatch(&verification_email(&notice))
            .await
            .map_err(AccountError::Delivery)?;

        info!(account_id = %account.id, "verification code sent");

        Ok(())
    }

    /// Consume a submitted code and mark the account verified.
    ///
    /// An expired code is cleared when it is reported as `Expired`, so submitting
    /// the same code again yields `InvalidCode`.
    ///
    /// # Errors
    /// `MissingFields`, `NotFound`, `InvalidCode` (mismatch, nothing stored, or a
    /// concurrent verification won), `Expired`, or `Storage`.
    #[instrument(skip(self, code))]
    pub async fn verify(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        code: Option<&str>,
    ) -> Result<Account, AccountError> {
        let (Some(username), Some(email), Some(code)) =
            (present(username), present(email), present(code))
        else {
            return Err(AccountError::MissingFields(
                "Username, email and code are required",
            ));
        };

        let account = self
            .ledger()
            .find_by_username_and_email(username, email)
            .await
            .map_err(AccountError::Storage)?
            .ok_or(AccountError::NotFound)?;

        if account.verification_code.as_deref() != Some(code) {
            return Err(AccountError::InvalidCode);
        }

        let now = Utc::now();
        let ttl = self.config().code_ttl();
        let expired = account
            .verification_sent_at
            .map_or(true, |sent_at| is_expired(sent_at, now, ttl));

        if expired {
            if let Err(err) = self.ledger().clear_code(account.id, code).await {
                error!("Failed to clear expired verification code: {err:#}");
            }
            return Err(AccountError::Expired);
        }

        match self
            .ledger()
            .consume_code(account.id, code, now, ttl)
            .await
            .map_err(AccountError::Storage)?
        {
            Some(verified) => {
                info!(account_id = %verified.id, "account verified");
                Ok(verified)
            }
            None => {
                debug!("Verification code was consumed or replaced concurrently");
                Err(AccountError::InvalidCode)
            }
        }
    }
}
