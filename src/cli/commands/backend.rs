//! Credential Store connection settings.

use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_AUTH_KEY: &str = "auth-key";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub key: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if the URL or the key is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(url) = get_non_empty(ARG_AUTH_URL) else {
            anyhow::bail!("missing required argument: --{ARG_AUTH_URL}");
        };
        let Some(key) = get_non_empty(ARG_AUTH_KEY) else {
            anyhow::bail!("missing required argument: --{ARG_AUTH_KEY}");
        };

        Ok(Self {
            url,
            key: SecretString::from(key),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Base URL of the GoTrue-compatible auth API, example: https://<project>.supabase.co")
                .env("PRDT_AUTH_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_AUTH_KEY)
                .long(ARG_AUTH_KEY)
                .help("API key sent to the auth API")
                .env("PRDT_AUTH_KEY")
                .hide_env_values(true)
                .required(true),
        )
}
