//! Session flow: login by username or email.

use tracing::{debug, error, instrument};

use super::{present, Account, AccountError, Accounts, CredentialError, Session};

impl Accounts {
    /// Look the account up by username or email and trade the password for a session.
    ///
    /// # Errors
    /// `MissingFields`, `NotFound`, `InvalidCredentials`, `Storage`, or `Unexpected`
    /// when the Credential Store is unreachable.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(Account, Session), AccountError> {
        let (Some(login), Some(password)) = (present(username), present(password)) else {
            return Err(AccountError::MissingFields(
                "Username and password are required",
            ));
        };

        let account = self
            .ledger()
            .find_by_login(login)
            .await
            .map_err(AccountError::Storage)?
            .ok_or(AccountError::NotFound)?;

        match self
            .credentials()
            .authenticate(&account.email, password)
            .await
        {
            Ok(session) => Ok((account, session)),
            Err(CredentialError::Rejected(message)) => {
                debug!("Credential store rejected login: {message}");
                Err(AccountError::InvalidCredentials)
            }
            Err(CredentialError::Unavailable(err)) => {
                error!("Credential store unavailable during login: {err:#}");
                Err(AccountError::Unexpected(err))
            }
        }
    }
}
