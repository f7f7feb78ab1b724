//! Account provisioning: identity, ledger row, first verification code.

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use tracing::{error, info, instrument, warn};

use super::{
    present, Account, AccountError, Accounts, CredentialError, InsertOutcome, NewAccount,
    RequestMeta,
};

pub const WALLET_PREFIX: &str = "PRDT";
const WALLET_SUFFIX_LEN: usize = 9;
const WALLET_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const WALLET_ATTEMPTS: usize = 3;

/// `PRDT_<unix millis>_<9 lowercase alphanumerics>`.
///
/// The suffix comes from the OS RNG; the ledger's unique constraint catches the rest.
#[must_use]
pub fn generate_wallet_address(now: DateTime<Utc>) -> String {
    let suffix: String = (0..WALLET_SUFFIX_LEN)
        .map(|_| char::from(WALLET_ALPHABET[OsRng.gen_range(0..WALLET_ALPHABET.len())]))
        .collect();
    format!("{WALLET_PREFIX}_{}_{suffix}", now.timestamp_millis())
}

impl Accounts {
    /// Register a new account and send its first verification code.
    ///
    /// Nothing is compensated on failure: an identity created before a failed ledger
    /// insert stays in the Credential Store.
    ///
    /// # Errors
    /// `MissingFields`, `Rejected` (Credential Store or ledger uniqueness), `Storage`,
    /// `Delivery`, or `Unexpected` when the Credential Store is unreachable.
    #[instrument(skip(self, password, meta))]
    pub async fn register(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<Account, AccountError> {
        let (Some(username), Some(email), Some(password)) =
            (present(username), present(email), present(password))
        else {
            return Err(AccountError::MissingFields(
                "Username, email and password are required",
            ));
        };

        let id = match self
            .credentials()
            .create_account(email, password, username)
            .await
        {
            Ok(id) => id,
            Err(CredentialError::Rejected(message)) => {
                warn!("Credential store rejected signup: {message}");
                return Err(AccountError::Rejected(message));
            }
            Err(CredentialError::Unavailable(err)) => return Err(AccountError::Unexpected(err)),
        };

        let account = self.insert_account(id, username, email).await?;
        info!(account_id = %account.id, wallet = %account.wallet_address, "account created");

        self.issue_code(&account, meta).await?;

        Ok(account)
    }

    async fn insert_account(
        &self,
        id: uuid::Uuid,
        username: &str,
        email: &str,
    ) -> Result<Account, AccountError> {
        for _ in 0..WALLET_ATTEMPTS {
            let new_account = NewAccount {
                id,
                username: username.to_string(),
                email: email.to_string(),
                wallet_address: generate_wallet_address(Utc::now()),
                balance: self.config().starting_balance(),
            };

            match self
                .ledger()
                .insert(&new_account)
                .await
                .map_err(AccountError::Storage)?
            {
                InsertOutcome::Created(account) => return Ok(account),
                InsertOutcome::Conflict(message) => return Err(AccountError::Rejected(message)),
                InsertOutcome::WalletTaken => {
                    warn!("Wallet address collision, generating a new one");
                }
            }
        }

        error!("Exhausted wallet address attempts for account {id}");
        Err(AccountError::Storage(anyhow::anyhow!(
            "failed to allocate a unique wallet address"
        )))
    }
}
