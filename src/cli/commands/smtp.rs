//! Mail relay settings. Without a password, mail is logged instead of sent.

use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::mail::SmtpConfig;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_MAIL_FROM: &str = "mail-from";

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
    pub from: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            host: get(ARG_SMTP_HOST)?,
            port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(465),
            username: get(ARG_SMTP_USERNAME)?,
            password: matches
                .get_one::<String>(ARG_SMTP_PASSWORD)
                .filter(|v| !v.is_empty())
                .map(|v| SecretString::from(v.as_str())),
            from: get(ARG_MAIL_FROM)?,
        })
    }

    /// Relay settings, when a password was given.
    #[must_use]
    pub fn smtp_config(&self) -> Option<SmtpConfig> {
        self.password.as_ref().map(|password| SmtpConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: password.clone(),
            from: self.from.clone(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (implicit TLS)")
                .env("PRDT_SMTP_HOST")
                .default_value("mail.prdttoken.com"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("PRDT_SMTP_PORT")
                .default_value("465")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP login")
                .env("PRDT_SMTP_USERNAME")
                .default_value("support@prdttoken.com"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password; when unset, verification emails are only logged")
                .env("PRDT_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address of verification emails")
                .env("PRDT_MAIL_FROM")
                .default_value("support@prdttoken.com"),
        )
}
