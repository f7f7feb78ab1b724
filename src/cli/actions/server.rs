use crate::{
    account::{AccountConfig, Accounts, GoTrueCredentials, PgLedger},
    api,
    mail::{LogMailDispatcher, MailDispatcher, SmtpConfig, SmtpMailDispatcher},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub auth_url: String,
    pub auth_key: SecretString,
    pub smtp: Option<SmtpConfig>,
    pub account: AccountConfig,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("auth_url", &self.auth_url)
            .field("auth_key", &"***")
            .field("smtp", &self.smtp)
            .field("account", &self.account)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if a collaborator client cannot be built, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(args.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let credentials = GoTrueCredentials::new(&args.auth_url, args.auth_key)
        .context("Failed to build credential store client")?;

    let mailer: Arc<dyn MailDispatcher> = if let Some(smtp) = &args.smtp {
        info!("Sending mail through {}:{}", smtp.host, smtp.port);
        Arc::new(SmtpMailDispatcher::new(smtp).context("Failed to build SMTP transport")?)
    } else {
        warn!("No SMTP password configured, verification emails will only be logged");
        Arc::new(LogMailDispatcher)
    };

    let accounts = Arc::new(Accounts::new(
        args.account,
        Arc::new(credentials),
        Arc::new(PgLedger::new(pool)),
        mailer,
    ));

    api::new(args.port, accounts).await
}
