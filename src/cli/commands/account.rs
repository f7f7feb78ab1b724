use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::account::{AccountConfig, MAX_CODE_TTL_SECONDS};

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_STARTING_BALANCE: &str = "starting-balance";

#[derive(Debug, Clone)]
pub struct Options {
    pub code_ttl_seconds: i64,
    pub starting_balance: Decimal,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let defaults = AccountConfig::default();
        Self {
            code_ttl_seconds: matches
                .get_one::<i64>(ARG_CODE_TTL_SECONDS)
                .copied()
                .unwrap_or_else(|| defaults.code_ttl_seconds()),
            starting_balance: matches
                .get_one::<Decimal>(ARG_STARTING_BALANCE)
                .copied()
                .unwrap_or_else(|| defaults.starting_balance()),
        }
    }

    #[must_use]
    pub fn account_config(&self) -> AccountConfig {
        AccountConfig::new()
            .with_code_ttl_seconds(self.code_ttl_seconds)
            .with_starting_balance(self.starting_balance)
    }
}

/// Non-negative decimal amount.
#[must_use]
pub fn validator_balance() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<Decimal, String> {
        match Decimal::from_str(value.trim()) {
            Ok(amount) if amount.is_sign_negative() => {
                Err("starting balance must not be negative".to_string())
            }
            Ok(amount) => Ok(amount),
            Err(err) => Err(format!("invalid amount: {err}")),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Verification code validity in seconds, at most one day")
                .env("PRDT_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_CODE_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_STARTING_BALANCE)
                .long(ARG_STARTING_BALANCE)
                .help("Balance credited to new accounts")
                .env("PRDT_STARTING_BALANCE")
                .default_value("1000.0")
                .value_parser(validator_balance()),
        )
}
