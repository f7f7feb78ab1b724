use thiserror::Error;

/// Failures surfaced by the account flows.
///
/// Handlers decide the status code per endpoint; the `Display` text of the
/// client-facing variants is the message returned to callers.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("User not found")]
    NotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Verification code has expired")]
    Expired,
    /// The Credential Store or the ledger declined the request; message is passed through.
    #[error("{0}")]
    Rejected(String),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("mail delivery failure: {0:#}")]
    Delivery(anyhow::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn client_facing_messages() {
        assert_eq!(
            AccountError::MissingFields("Username and email are required").to_string(),
            "Username and email are required"
        );
        assert_eq!(AccountError::NotFound.to_string(), "User not found");
        assert_eq!(
            AccountError::InvalidCode.to_string(),
            "Invalid verification code"
        );
        assert_eq!(
            AccountError::Expired.to_string(),
            "Verification code has expired"
        );
        assert_eq!(
            AccountError::Rejected("User already registered".to_string()).to_string(),
            "User already registered"
        );
    }

    #[test]
    fn internal_failures_keep_context() {
        let err = AccountError::Storage(anyhow!("connection refused").context("update users"));
        assert_eq!(
            err.to_string(),
            "storage failure: update users: connection refused"
        );

        let err: AccountError = anyhow!("boom").into();
        assert!(matches!(err, AccountError::Unexpected(_)));
    }
}
