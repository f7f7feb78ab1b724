//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{account, backend, smtp, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .context("missing required argument: --dsn")?;

    let backend_opts = backend::Options::parse(matches)?;
    let smtp_opts = smtp::Options::parse(matches)?;
    let account_opts = account::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        auth_url: backend_opts.url,
        auth_key: backend_opts.key,
        smtp: smtp_opts.smtp_config(),
        account: account_opts.account_config(),
    }))
}
