//! Mail Dispatcher: delivers one email with a plain-text and an HTML body.
//!
//! Production sends through an SMTP relay over implicit TLS. Without an SMTP
//! password the service falls back to [`LogMailDispatcher`], which only logs the
//! recipient and subject, so local runs work without a mailbox.

pub mod template;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, info_span, Instrument};

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait MailDispatcher: Send + Sync {
    /// Deliver a message or return why it could not be delivered.
    async fn dispatch(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev dispatcher that logs instead of sending.
#[derive(Clone, Debug)]
pub struct LogMailDispatcher;

#[async_trait]
impl MailDispatcher for LogMailDispatcher {
    async fn dispatch(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "mail dispatch stub"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .finish()
    }
}

/// SMTP relay client, pooled by lettre and shared by every request.
pub struct SmtpMailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpMailDispatcher {
    /// # Errors
    /// Returns an error if the sender address or the relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.from))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .with_context(|| format!("invalid SMTP relay: {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from,
            host: config.host.clone(),
        })
    }
}

impl std::fmt::Debug for SmtpMailDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailDispatcher")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailDispatcher for SmtpMailDispatcher {
    async fn dispatch(&self, message: &EmailMessage) -> Result<()> {
        let email = build_message(&self.from, message)?;
        let span = info_span!("smtp.send", smtp.host = %self.host);

        self.transport
            .send(email)
            .instrument(span)
            .await
            .context("SMTP relay refused the message")?;

        Ok(())
    }
}

fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message> {
    let to: Mailbox = message
        .to_email
        .parse()
        .with_context(|| format!("invalid recipient address: {}", message.to_email))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ))
        .context("failed to build email")
}

/// Captures messages in memory; can be switched to fail every delivery.
#[derive(Debug, Default)]
pub struct MemoryMailDispatcher {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl MemoryMailDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailDispatcher for MemoryMailDispatcher {
    async fn dispatch(&self, message: &EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("mail relay unavailable");
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to_email: to.to_string(),
            subject: "subject".to_string(),
            text: "text".to_string(),
            html: "<p>html</p>".to_string(),
        }
    }

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "mail.prdttoken.com".to_string(),
            port: 465,
            username: "support@prdttoken.com".to_string(),
            password: SecretString::from("mail-password"),
            from: "support@prdttoken.com".to_string(),
        }
    }

    #[test]
    fn build_message_rejects_bad_recipient() -> Result<()> {
        let from: Mailbox = "support@prdttoken.com".parse()?;
        assert!(build_message(&from, &message("alice@example.com")).is_ok());
        assert!(build_message(&from, &message("not an address")).is_err());
        Ok(())
    }

    #[test]
    fn smtp_debug_redacts_password() {
        let rendered = format!("{:?}", smtp_config());
        assert!(rendered.contains("mail.prdttoken.com"));
        assert!(!rendered.contains("mail-password"));
    }

    #[test]
    fn smtp_dispatcher_rejects_bad_sender() {
        let mut config = smtp_config();
        config.from = "nobody".to_string();
        assert!(SmtpMailDispatcher::new(&config).is_err());
    }

    #[tokio::test]
    async fn memory_dispatcher_captures_and_fails() {
        let dispatcher = MemoryMailDispatcher::new();
        assert!(dispatcher.dispatch(&message("a@x.com")).await.is_ok());
        assert_eq!(dispatcher.sent().await, vec![message("a@x.com")]);

        dispatcher.fail_deliveries(true);
        assert!(dispatcher.dispatch(&message("b@x.com")).await.is_err());
        assert_eq!(dispatcher.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn log_dispatcher_always_succeeds() {
        assert!(LogMailDispatcher.dispatch(&message("a@x.com")).await.is_ok());
    }
}
