//! # PRDT (Token Wallet Accounts)
//!
//! `prdt` serves the account endpoints of the PRDT Token wallet: registration,
//! login, sending an email verification code and verifying that code.
//!
//! ## Collaborators
//!
//! The service owns no identity or storage engine of its own. Every flow talks to
//! three collaborators through narrow traits, built once at startup and shared by
//! all requests:
//!
//! - **Credential Store** ([`account::CredentialStore`]): account creation,
//!   password checks and session tokens (GoTrue-compatible REST API).
//! - **Account Ledger** ([`account::AccountLedger`]): the `users` table holding
//!   wallet address, balance and verification state (`PostgreSQL`).
//! - **Mail Dispatcher** ([`mail::MailDispatcher`]): SMTP delivery of the
//!   verification email.
//!
//! ## Verification Codes
//!
//! A 6-digit code is stored on the account row together with the time it was sent.
//! It is valid for 10 minutes (strictly greater-than is expired) and is consumed by a
//! single conditional update, so a code can verify an account at most once.

pub mod account;
pub mod api;
pub mod cli;
pub mod mail;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
