use chrono::{Duration, Utc};

use dealdesk_auth::domain::types::FederationPolicy;
use dealdesk_auth::error::AuthServiceError;
use dealdesk_auth::usecase::session::{IssueSessionUseCase, LogoutUseCase, Requirement};
use dealdesk_domain::audit::AuditAction;
use dealdesk_domain::role::Role;

use crate::helpers::{Fixture, federated_account, local_account, test_client};

async fn issue(fx: &Fixture, account: &dealdesk_auth::domain::types::Account) -> String {
    IssueSessionUseCase {
        sessions: fx.sessions.clone(),
    }
    .execute(account)
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn should_resolve_session_into_current_user() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);
    let session_id = issue(&fx, &account).await;

    let user = fx
        .authorize()
        .execute(Some(&session_id), Requirement::Authenticated)
        .await
        .unwrap();

    assert_eq!(user.account_id, account.id);
    assert_eq!(user.email, "alice@acme.com");
    assert_eq!(user.name, "Alice Doe");
    assert!(!user.disabled);
}

#[tokio::test]
async fn should_bootstrap_local_account_as_sales() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);
    let session_id = issue(&fx, &account).await;

    let user = fx
        .authorize()
        .execute(Some(&session_id), Requirement::Authenticated)
        .await
        .unwrap();

    assert_eq!(user.role, Role::Sales);
    assert_eq!(fx.profiles.role_of(account.id), Some(Role::Sales));
}

#[tokio::test]
async fn should_bootstrap_federated_account_with_policy_role() {
    let account = federated_account("fed@acme.com");
    let fx = Fixture::with_accounts(vec![account.clone()]).with_policy(FederationPolicy {
        default_role_for_sso: Role::Manager,
        ..FederationPolicy::default()
    });
    let session_id = issue(&fx, &account).await;

    let user = fx
        .authorize()
        .execute(Some(&session_id), Requirement::Authenticated)
        .await
        .unwrap();
    assert_eq!(user.role, Role::Manager);
}

#[tokio::test]
async fn should_reject_missing_unknown_and_expired_sessions() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);

    let missing = fx.authorize().execute(None, Requirement::Authenticated).await;
    assert!(matches!(missing, Err(AuthServiceError::Unauthenticated)));

    let unknown = fx
        .authorize()
        .execute(Some("no-such-session"), Requirement::Authenticated)
        .await;
    assert!(matches!(unknown, Err(AuthServiceError::Unauthenticated)));

    let session_id = issue(&fx, &account).await;
    for session in fx.sessions.sessions.lock().unwrap().iter_mut() {
        session.expires_at = Utc::now() - Duration::seconds(1);
    }
    let expired = fx
        .authorize()
        .execute(Some(&session_id), Requirement::Authenticated)
        .await;
    assert!(matches!(expired, Err(AuthServiceError::Unauthenticated)));
    assert_eq!(fx.sessions.count_for(account.id), 0);
}

#[tokio::test]
async fn should_evict_every_session_of_disabled_account() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);
    let first = issue(&fx, &account).await;
    issue(&fx, &account).await;

    fx.accounts.accounts.lock().unwrap()[0].disabled = true;

    let result = fx
        .authorize()
        .execute(Some(&first), Requirement::Authenticated)
        .await;
    assert!(
        matches!(result, Err(AuthServiceError::AccountDisabled)),
        "expected AccountDisabled, got {result:?}"
    );
    assert_eq!(fx.sessions.count_for(account.id), 0);
}

#[tokio::test]
async fn should_gate_admin_operations_on_role() {
    let sales = local_account("sales@acme.com").await;
    let admin = local_account("admin@acme.com").await;
    let mut fx = Fixture::with_accounts(vec![sales.clone(), admin.clone()]);
    fx.profiles = fx.profiles.clone().with_role(admin.id, Role::Admin);
    let sales_session = issue(&fx, &sales).await;
    let admin_session = issue(&fx, &admin).await;

    let refused = fx
        .authorize()
        .execute(Some(&sales_session), Requirement::Admin)
        .await;
    assert!(matches!(refused, Err(AuthServiceError::Forbidden)));

    let allowed = fx
        .authorize()
        .execute(Some(&admin_session), Requirement::Admin)
        .await
        .unwrap();
    assert!(allowed.is_admin());
}

#[tokio::test]
async fn should_logout_idempotently() {
    let account = local_account("alice@acme.com").await;
    let fx = Fixture::with_accounts(vec![account.clone()]);
    let session_id = issue(&fx, &account).await;
    let logout = LogoutUseCase {
        sessions: fx.sessions.clone(),
        audit: fx.audit.clone(),
    };

    logout.execute(Some(&session_id), &test_client()).await.unwrap();
    logout.execute(Some(&session_id), &test_client()).await.unwrap();
    logout.execute(None, &test_client()).await.unwrap();

    assert_eq!(fx.sessions.count_for(account.id), 0);
    let logouts = fx
        .audit
        .events()
        .into_iter()
        .filter(|e| e.action == AuditAction::Logout)
        .count();
    assert_eq!(logouts, 1);
}
