use super::memory::{MemoryCredentials, MemoryLedger};
use super::*;
use crate::mail::MemoryMailDispatcher;
use anyhow::Result;

struct Harness {
    accounts: Arc<Accounts>,
    ledger: Arc<MemoryLedger>,
    mailer: Arc<MemoryMailDispatcher>,
}

fn harness() -> Harness {
    harness_with(AccountConfig::new())
}

fn harness_with(config: AccountConfig) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let mailer = Arc::new(MemoryMailDispatcher::new());
    let accounts = Arc::new(Accounts::new(
        config,
        Arc::new(MemoryCredentials::new()),
        ledger.clone(),
        mailer.clone(),
    ));
    Harness {
        accounts,
        ledger,
        mailer,
    }
}

fn meta() -> RequestMeta {
    RequestMeta {
        client_ip: "203.0.113.7".to_string(),
        device: Some("Pixel 8".to_string()),
        os: None,
    }
}

async fn register_alice(h: &Harness) -> Result<Account> {
    Ok(h.accounts
        .register(
            Some("alice"),
            Some("alice@example.com"),
            Some("Secret123!"),
            &meta(),
        )
        .await?)
}

async fn stored_code(h: &Harness, id: Uuid) -> Option<String> {
    h.ledger.get(id).await.and_then(|row| row.verification_code)
}

#[tokio::test]
async fn register_creates_unverified_account_and_mails_code() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;

    assert!(!account.verified);
    assert_eq!(account.balance, Decimal::new(1000, 0));
    assert!(account.wallet_address.starts_with("PRDT_"));

    let code = stored_code(&h, account.id).await;
    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "alice@example.com");
    assert!(code.is_some_and(|code| sent[0].text.contains(&code)));
    assert!(sent[0].text.contains("203.0.113.7"));
    Ok(())
}

#[tokio::test]
async fn register_requires_all_fields() {
    let h = harness();
    let result = h
        .accounts
        .register(Some("alice"), Some(""), Some("Secret123!"), &meta())
        .await;
    assert!(matches!(
        result,
        Err(AccountError::MissingFields("Username, email and password are required"))
    ));
}

#[tokio::test]
async fn register_surfaces_credential_rejection() -> Result<()> {
    let h = harness();
    register_alice(&h).await?;

    let result = h
        .accounts
        .register(
            Some("alice2"),
            Some("alice@example.com"),
            Some("Secret123!"),
            &meta(),
        )
        .await;
    assert!(matches!(result, Err(AccountError::Rejected(message)) if message == "User already registered"));
    Ok(())
}

#[tokio::test]
async fn register_reports_delivery_failure_without_rollback() -> Result<()> {
    let h = harness();
    h.mailer.fail_deliveries(true);

    let result = h
        .accounts
        .register(
            Some("alice"),
            Some("alice@example.com"),
            Some("Secret123!"),
            &meta(),
        )
        .await;
    assert!(matches!(result, Err(AccountError::Delivery(_))));

    let row = h.ledger.find_by_login("alice").await?;
    assert!(row.is_some_and(|row| !row.verified));
    Ok(())
}

#[tokio::test]
async fn login_by_username_or_email() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;

    let (by_name, session) = h.accounts.login(Some("alice"), Some("Secret123!")).await?;
    assert_eq!(by_name.id, account.id);
    assert!(!session.access_token.is_empty());

    let (by_email, _) = h
        .accounts
        .login(Some("alice@example.com"), Some("Secret123!"))
        .await?;
    assert_eq!(by_email.id, account.id);
    Ok(())
}

#[tokio::test]
async fn login_failures() -> Result<()> {
    let h = harness();
    register_alice(&h).await?;

    assert!(matches!(
        h.accounts.login(Some("alice"), None).await,
        Err(AccountError::MissingFields(_))
    ));
    assert!(matches!(
        h.accounts.login(Some("bob"), Some("Secret123!")).await,
        Err(AccountError::NotFound)
    ));
    assert!(matches!(
        h.accounts.login(Some("alice"), Some("wrong-password")).await,
        Err(AccountError::InvalidCredentials)
    ));
    Ok(())
}

#[tokio::test]
async fn verify_with_stored_code_marks_account_verified_once() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;

    let verified = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await?;
    assert!(verified.verified);
    assert!(verified.verified_at.is_some());
    assert_eq!(verified.verification_code, None);
    assert_eq!(verified.verification_sent_at, None);

    let again = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await;
    assert!(matches!(again, Err(AccountError::InvalidCode)));
    Ok(())
}

#[tokio::test]
async fn mismatched_code_leaves_row_untouched() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let before = h.ledger.get(account.id).await;

    let wrong = match stored_code(&h, account.id).await.as_deref() {
        Some("000000") | None => "111111",
        Some(_) => "000000",
    };
    let result = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(wrong))
        .await;

    assert!(matches!(result, Err(AccountError::InvalidCode)));
    assert_eq!(h.ledger.get(account.id).await, before);
    Ok(())
}

#[tokio::test]
async fn verify_unknown_account_is_not_found() {
    let h = harness();
    let result = h
        .accounts
        .verify(Some("ghost"), Some("ghost@example.com"), Some("123456"))
        .await;
    assert!(matches!(result, Err(AccountError::NotFound)));
}

#[tokio::test]
async fn expired_code_is_rejected_and_cleared() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;

    h.ledger
        .age_code(account.id, Duration::minutes(10) + Duration::seconds(1))
        .await;

    let result = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await;
    assert!(matches!(result, Err(AccountError::Expired)));

    let row = h.ledger.get(account.id).await;
    assert!(row.is_some_and(|row| !row.verified && row.verification_code.is_none()));

    // The expired code is gone, so resubmitting it no longer matches anything.
    let again = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await;
    assert!(matches!(again, Err(AccountError::InvalidCode)));
    Ok(())
}

#[tokio::test]
async fn code_verifies_late_in_the_window() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;

    h.ledger
        .age_code(account.id, Duration::minutes(10) - Duration::seconds(1))
        .await;

    let verified = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await?;
    assert!(verified.verified);
    assert_eq!(verified.verification_code, None);
    Ok(())
}

#[tokio::test]
async fn oversized_window_is_capped_and_verifies() -> Result<()> {
    let h = harness_with(AccountConfig::new().with_code_ttl_seconds(10_000_000_000_000));
    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;

    let verified = h
        .accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await?;
    assert!(verified.verified);

    let sent = h.mailer.sent().await;
    assert!(sent
        .last()
        .is_some_and(|message| message.text.contains("Code validity: 1440 minutes")));
    Ok(())
}

#[tokio::test]
async fn resend_replaces_previous_code() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let first = stored_code(&h, account.id).await;

    let outcome = h
        .accounts
        .send_verification(Some("alice"), Some("alice@example.com"), &meta())
        .await?;
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(h.mailer.sent().await.len(), 2);

    let second = stored_code(&h, account.id).await;
    assert!(second.is_some());
    if first != second {
        let stale = h
            .accounts
            .verify(
                Some("alice"),
                Some("alice@example.com"),
                first.as_deref(),
            )
            .await;
        assert!(matches!(stale, Err(AccountError::InvalidCode)));
    }
    Ok(())
}

#[tokio::test]
async fn send_verification_skips_unknown_and_verified_accounts() -> Result<()> {
    let h = harness();

    let outcome = h
        .accounts
        .send_verification(Some("ghost"), Some("ghost@example.com"), &meta())
        .await?;
    assert_eq!(outcome, SendOutcome::NoAccount);

    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;
    h.accounts
        .verify(Some("alice"), Some("alice@example.com"), Some(&code))
        .await?;

    let outcome = h
        .accounts
        .send_verification(Some("alice"), Some("alice@example.com"), &meta())
        .await?;
    assert_eq!(outcome, SendOutcome::AlreadyVerified);
    assert_eq!(h.mailer.sent().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn send_verification_requires_username_and_email() {
    let h = harness();
    let result = h
        .accounts
        .send_verification(None, Some("alice@example.com"), &meta())
        .await;
    assert!(matches!(
        result,
        Err(AccountError::MissingFields("Username and email are required"))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifies_succeed_exactly_once() -> Result<()> {
    let h = harness();
    let account = register_alice(&h).await?;
    let code = stored_code(&h, account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no code stored"))?;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let accounts = h.accounts.clone();
            let code = code.clone();
            tokio::spawn(async move {
                accounts
                    .verify(Some("alice"), Some("alice@example.com"), Some(&code))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        match attempt.await? {
            Ok(_) => successes += 1,
            Err(AccountError::InvalidCode) => {}
            Err(err) => anyhow::bail!("unexpected verify error: {err}"),
        }
    }
    assert_eq!(successes, 1);
    Ok(())
}

#[tokio::test]
async fn verification_state_tracks_lifecycle() -> Result<()> {
    let h = harness();
    let ttl = h.accounts.config().code_ttl();
    let account = register_alice(&h).await?;

    let row = h
        .ledger
        .get(account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(
        VerificationState::of(&row, Utc::now(), ttl),
        VerificationState::CodePending
    );

    h.ledger.age_code(account.id, Duration::minutes(11)).await;
    let row = h
        .ledger
        .get(account.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("row missing"))?;
    assert_eq!(
        VerificationState::of(&row, Utc::now(), ttl),
        VerificationState::ExpiredPending
    );
    Ok(())
}
