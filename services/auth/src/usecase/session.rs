use chrono::{Duration, Utc};

use dealdesk_auth_types::cookie::SESSION_TTL_SECS;
use dealdesk_auth_types::identity::CurrentUser;
use dealdesk_domain::account::AccountOrigin;
use dealdesk_domain::audit::{AuditAction, AuthProvider};
use dealdesk_domain::role::Role;

use crate::domain::repository::{
    AccountRepository, AuditRepository, PolicyRepository, ProfileDirectory, SessionRepository,
};
use crate::domain::types::{Account, AuditEvent, ClientInfo, Session};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;
use crate::usecase::policy::load_policy;
use crate::usecase::secret::opaque_token;

// ── IssueSession ─────────────────────────────────────────────────────────────

pub struct IssueSessionUseCase<S: SessionRepository> {
    pub sessions: S,
}

impl<S: SessionRepository> IssueSessionUseCase<S> {
    pub async fn execute(&self, account: &Account) -> Result<Session, AuthServiceError> {
        let now = Utc::now();
        let session = Session {
            id: opaque_token(),
            account_id: account.id,
            email: account.email.clone(),
            display_name: account.display_name(),
            origin: account.origin,
            disabled: account.disabled,
            created_at: now,
            expires_at: now + Duration::seconds(SESSION_TTL_SECS as i64),
        };
        self.sessions.create(&session).await?;
        Ok(session)
    }
}

// ── Logout ───────────────────────────────────────────────────────────────────

pub struct LogoutUseCase<S: SessionRepository, D: AuditRepository> {
    pub sessions: S,
    pub audit: D,
}

impl<S: SessionRepository, D: AuditRepository> LogoutUseCase<S, D> {
    /// Idempotent: an unknown or missing session id is not an error.
    pub async fn execute(
        &self,
        session_id: Option<&str>,
        client: &ClientInfo,
    ) -> Result<(), AuthServiceError> {
        let Some(session_id) = session_id else {
            return Ok(());
        };
        let Some(session) = self.sessions.find(session_id).await? else {
            return Ok(());
        };
        self.sessions.delete(&session.id).await?;

        let provider = match session.origin {
            AccountOrigin::Local => AuthProvider::Local,
            AccountOrigin::Federated => AuthProvider::Microsoft,
        };
        record(
            &self.audit,
            AuditEvent::success(AuditAction::Logout, provider)
                .account_id(session.account_id)
                .email(&session.email)
                .client(client),
        )
        .await;
        Ok(())
    }
}

// ── Authorize ────────────────────────────────────────────────────────────────

/// What a gated operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Admin,
}

/// Resolves a session id into the current user, re-reading the account on every call.
pub struct AuthorizeUseCase<
    S: SessionRepository,
    A: AccountRepository,
    R: ProfileDirectory,
    P: PolicyRepository,
> {
    pub sessions: S,
    pub accounts: A,
    pub profiles: R,
    pub policies: P,
}

impl<S: SessionRepository, A: AccountRepository, R: ProfileDirectory, P: PolicyRepository>
    AuthorizeUseCase<S, A, R, P>
{
    pub async fn execute(
        &self,
        session_id: Option<&str>,
        requirement: Requirement,
    ) -> Result<CurrentUser, AuthServiceError> {
        let session_id = session_id.ok_or(AuthServiceError::Unauthenticated)?;
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or(AuthServiceError::Unauthenticated)?;

        if session.is_expired(Utc::now()) {
            self.sessions.delete(&session.id).await?;
            return Err(AuthServiceError::Unauthenticated);
        }

        let Some(account) = self.accounts.find_by_id(session.account_id).await? else {
            self.sessions.delete(&session.id).await?;
            return Err(AuthServiceError::Unauthenticated);
        };

        // The account row is authoritative over the flag cached in the session.
        if account.disabled {
            let evicted = self.sessions.delete_for_account(account.id).await?;
            tracing::info!(account_id = %account.id, evicted, "evicted sessions of disabled account");
            return Err(AuthServiceError::AccountDisabled);
        }

        let role = self.resolve_role(&account).await?;

        if requirement == Requirement::Admin && !role.is_admin() {
            return Err(AuthServiceError::Forbidden);
        }

        Ok(CurrentUser {
            account_id: account.id,
            email: account.email.clone(),
            name: account.display_name(),
            role,
            disabled: account.disabled,
        })
    }

    /// Existing profile role, bootstrapping a profile on first use.
    async fn resolve_role(&self, account: &Account) -> Result<Role, AuthServiceError> {
        if let Some(role) = self.profiles.find_role(account.id).await? {
            return Ok(role);
        }
        let initial = match account.origin {
            AccountOrigin::Local => Role::Sales,
            AccountOrigin::Federated => load_policy(&self.policies).await?.default_role_for_sso,
        };
        self.profiles.ensure_profile(account.id, initial).await
    }
}
