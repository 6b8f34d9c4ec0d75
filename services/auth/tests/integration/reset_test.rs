use chrono::{DateTime, Duration, Utc};

use dealdesk_auth::domain::repository::ResetTokenRepository;
use dealdesk_auth::domain::types::{FederationPolicy, PasswordResetToken};
use dealdesk_auth::error::AuthServiceError;
use dealdesk_auth::usecase::authenticate::AuthMethod;
use dealdesk_auth::usecase::reset::{
    RequestResetUseCase, ResetPasswordInput, ResetPasswordUseCase,
};
use dealdesk_auth::usecase::session::IssueSessionUseCase;
use dealdesk_domain::audit::AuditAction;

use crate::helpers::{
    Fixture, MockResetTokens, TEST_PASSWORD, federated_account, local_account, test_client,
    test_hasher,
};

fn request_reset(
    fx: &Fixture,
) -> RequestResetUseCase<
    crate::helpers::MockAccounts,
    MockResetTokens,
    crate::helpers::MockPolicy,
    crate::helpers::MockAudit,
> {
    RequestResetUseCase {
        accounts: fx.accounts.clone(),
        tokens: fx.tokens.clone(),
        policies: fx.policies.clone(),
        audit: fx.audit.clone(),
    }
}

fn reset_password(
    fx: &Fixture,
) -> ResetPasswordUseCase<
    crate::helpers::MockAccounts,
    MockResetTokens,
    crate::helpers::MockSessions,
    crate::helpers::MockAudit,
> {
    ResetPasswordUseCase {
        accounts: fx.accounts.clone(),
        tokens: fx.tokens.clone(),
        sessions: fx.sessions.clone(),
        audit: fx.audit.clone(),
        hasher: test_hasher(),
    }
}

fn input(token: &str, password: &str) -> ResetPasswordInput {
    ResetPasswordInput {
        token: token.to_owned(),
        new_password: password.to_owned(),
    }
}

// ── RequestReset ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_issue_token_valid_for_a_day() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);

    let output = request_reset(&fx)
        .execute("Alice@Acme.com", &test_client())
        .await
        .unwrap();

    let token = output.token.unwrap();
    assert_eq!(token.account_id, account.id);
    assert!(token.token.len() >= 43);
    let ttl = token.expires_at - token.created_at;
    assert_eq!(ttl, Duration::hours(24));
    assert_eq!(fx.tokens.tokens.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_succeed_silently_for_unknown_email() {
    let fx = Fixture::default();

    let output = request_reset(&fx)
        .execute("ghost@acme.com", &test_client())
        .await
        .unwrap();

    assert!(output.token.is_none());
    assert!(fx.tokens.tokens.lock().unwrap().is_empty());
    let event = fx.audit.last(AuditAction::PasswordResetRequest).unwrap();
    assert_eq!(event.failure_reason.as_deref(), Some("account_not_found"));
}

#[tokio::test]
async fn should_refuse_reset_for_sso_only_account() {
    let fx = Fixture::with_accounts(vec![federated_account("fed@acme.com")]);

    let result = request_reset(&fx).execute("fed@acme.com", &test_client()).await;
    assert!(matches!(result, Err(AuthServiceError::SsoOnlyAccount)));
}

#[tokio::test]
async fn should_refuse_reset_request_when_federation_only() {
    let fx = Fixture::with_accounts(vec![local_account("alice@acme.com").await]).with_policy(
        FederationPolicy {
            federation_only: true,
            ..FederationPolicy::default()
        },
    );

    let result = request_reset(&fx)
        .execute("alice@acme.com", &test_client())
        .await;
    assert!(matches!(result, Err(AuthServiceError::LocalAuthDisabled)));
}

// ── ResetPassword ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reset_password_once_and_revoke_sessions() {
    let account = local_account("alice@acme.com").await;
    let mut fx = Fixture::with_accounts(vec![account.clone()]);
    let token = PasswordResetToken::new("reset-token".to_owned(), account.id, Utc::now());
    fx.tokens = MockResetTokens::new(vec![token]);
    IssueSessionUseCase {
        sessions: fx.sessions.clone(),
    }
    .execute(&account)
    .await
    .unwrap();

    reset_password(&fx)
        .execute(input("reset-token", "brand-new-pass"), &test_client())
        .await
        .unwrap();

    assert_eq!(fx.sessions.count_for(account.id), 0);
    assert!(fx.audit.last(AuditAction::PasswordResetComplete).unwrap().success);

    let old = fx
        .authenticate(None)
        .execute(
            AuthMethod::Local {
                email: "alice@acme.com".to_owned(),
                password: TEST_PASSWORD.to_owned(),
            },
            &test_client(),
        )
        .await;
    assert!(matches!(old, Err(AuthServiceError::InvalidCredentials)));

    let new = fx
        .authenticate(None)
        .execute(
            AuthMethod::Local {
                email: "alice@acme.com".to_owned(),
                password: "brand-new-pass".to_owned(),
            },
            &test_client(),
        )
        .await;
    assert!(new.is_ok());

    let again = reset_password(&fx)
        .execute(input("reset-token", "another-pass"), &test_client())
        .await;
    assert!(
        matches!(again, Err(AuthServiceError::TokenAlreadyUsed)),
        "expected TokenAlreadyUsed, got {again:?}"
    );
}

#[tokio::test]
async fn should_reject_unknown_and_expired_tokens() {
    let account = local_account("alice@acme.com").await;
    let mut fx = Fixture::with_accounts(vec![account.clone()]);
    let expired = PasswordResetToken::new(
        "expired".to_owned(),
        account.id,
        Utc::now() - Duration::hours(25),
    );
    fx.tokens = MockResetTokens::new(vec![expired]);

    let unknown = reset_password(&fx)
        .execute(input("nope", "brand-new-pass"), &test_client())
        .await;
    assert!(matches!(unknown, Err(AuthServiceError::InvalidOrExpiredToken)));

    let stale = reset_password(&fx)
        .execute(input("expired", "brand-new-pass"), &test_client())
        .await;
    assert!(matches!(stale, Err(AuthServiceError::InvalidOrExpiredToken)));
    assert_eq!(fx.accounts.write_count(), 0);
}

#[tokio::test]
async fn should_reject_weak_new_password_without_consuming_token() {
    let account = local_account("alice@acme.com").await;
    let mut fx = Fixture::with_accounts(vec![account.clone()]);
    fx.tokens = MockResetTokens::new(vec![PasswordResetToken::new(
        "reset-token".to_owned(),
        account.id,
        Utc::now(),
    )]);

    let result = reset_password(&fx)
        .execute(input("reset-token", "short"), &test_client())
        .await;
    assert!(matches!(result, Err(AuthServiceError::WeakPassword)));
    assert!(fx.tokens.tokens.lock().unwrap()[0].used_at.is_none());
}

#[tokio::test]
async fn should_let_exactly_one_concurrent_redeemer_win() {
    let account = local_account("alice@acme.com").await;
    let mut fx = Fixture::with_accounts(vec![account.clone()]);
    fx.tokens = MockResetTokens::new(vec![PasswordResetToken::new(
        "reset-token".to_owned(),
        account.id,
        Utc::now(),
    )]);

    let first = reset_password(&fx);
    let second = reset_password(&fx);
    let client = test_client();
    let (a, b) = tokio::join!(
        first.execute(input("reset-token", "first-new-pass"), &client),
        second.execute(input("reset-token", "second-new-pass"), &client),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AuthServiceError::TokenAlreadyUsed)))
            .count(),
        1
    );
}

/// Token store whose clock passes the expiry while the new password is hashed.
struct ExpiresBeforeConsume(MockResetTokens);

impl ResetTokenRepository for ExpiresBeforeConsume {
    async fn create(&self, token: &PasswordResetToken) -> Result<(), AuthServiceError> {
        self.0.create(token).await
    }

    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>, AuthServiceError> {
        self.0.find(token).await
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AuthServiceError> {
        for t in self.0.tokens.lock().unwrap().iter_mut() {
            if t.token == token {
                t.expires_at = now - Duration::seconds(1);
            }
        }
        self.0.consume(token, now).await
    }
}

#[tokio::test]
async fn should_report_token_expiring_mid_reset_as_expired() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);
    let tokens = MockResetTokens::new(vec![PasswordResetToken::new(
        "reset-token".to_owned(),
        account.id,
        Utc::now() - Duration::hours(24) + Duration::seconds(30),
    )]);
    let usecase = ResetPasswordUseCase {
        accounts: fx.accounts.clone(),
        tokens: ExpiresBeforeConsume(tokens.clone()),
        sessions: fx.sessions.clone(),
        audit: fx.audit.clone(),
        hasher: test_hasher(),
    };

    let result = usecase
        .execute(input("reset-token", "brand-new-pass"), &test_client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOrExpiredToken)),
        "expected InvalidOrExpiredToken, got {result:?}"
    );
    assert!(tokens.tokens.lock().unwrap()[0].used_at.is_none());
    assert_eq!(
        fx.accounts.get(account.id).unwrap().password_hash,
        account.password_hash
    );
    let event = fx.audit.last(AuditAction::PasswordResetComplete).unwrap();
    assert_eq!(event.failure_reason.as_deref(), Some("token_expired"));
}
