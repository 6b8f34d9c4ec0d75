use chrono::Utc;

use dealdesk_domain::account::{AccountOrigin, normalize_email};
use dealdesk_domain::audit::{AuditAction, AuthProvider};

use crate::domain::repository::{
    AccountRepository, AuditRepository, PolicyRepository, ResetTokenRepository, SessionRepository,
};
use crate::domain::types::{AuditEvent, ClientInfo, PasswordResetToken};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;
use crate::usecase::password::{PasswordHasher, validate_password};
use crate::usecase::policy::load_policy;
use crate::usecase::secret::opaque_token;

// ── RequestReset ─────────────────────────────────────────────────────────────

/// Outcome of a reset request. `token` is `None` when no account matched; callers must
/// present both outcomes identically to the requester.
#[derive(Debug)]
pub struct RequestResetOutput {
    pub token: Option<PasswordResetToken>,
}

pub struct RequestResetUseCase<
    A: AccountRepository,
    T: ResetTokenRepository,
    P: PolicyRepository,
    D: AuditRepository,
> {
    pub accounts: A,
    pub tokens: T,
    pub policies: P,
    pub audit: D,
}

impl<A: AccountRepository, T: ResetTokenRepository, P: PolicyRepository, D: AuditRepository>
    RequestResetUseCase<A, T, P, D>
{
    pub async fn execute(
        &self,
        email: &str,
        client: &ClientInfo,
    ) -> Result<RequestResetOutput, AuthServiceError> {
        let email = normalize_email(email);

        if load_policy(&self.policies).await?.federation_only {
            record(
                &self.audit,
                AuditEvent::failure(
                    AuditAction::PasswordResetRequest,
                    AuthProvider::Local,
                    "local_auth_disabled",
                )
                .email(&email)
                .client(client),
            )
            .await;
            return Err(AuthServiceError::LocalAuthDisabled);
        }

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            record(
                &self.audit,
                AuditEvent::failure(
                    AuditAction::PasswordResetRequest,
                    AuthProvider::Local,
                    "account_not_found",
                )
                .email(&email)
                .client(client),
            )
            .await;
            return Ok(RequestResetOutput { token: None });
        };

        if account.origin == AccountOrigin::Federated && !account.has_password() {
            record(
                &self.audit,
                AuditEvent::failure(
                    AuditAction::PasswordResetRequest,
                    AuthProvider::Local,
                    "sso_only_account",
                )
                .account(&account)
                .client(client),
            )
            .await;
            return Err(AuthServiceError::SsoOnlyAccount);
        }

        let token = PasswordResetToken::new(opaque_token(), account.id, Utc::now());
        self.tokens.create(&token).await?;

        record(
            &self.audit,
            AuditEvent::success(AuditAction::PasswordResetRequest, AuthProvider::Local)
                .account(&account)
                .client(client),
        )
        .await;

        Ok(RequestResetOutput { token: Some(token) })
    }
}

// ── ResetPassword ────────────────────────────────────────────────────────────

pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

pub struct ResetPasswordUseCase<
    A: AccountRepository,
    T: ResetTokenRepository,
    S: SessionRepository,
    D: AuditRepository,
> {
    pub accounts: A,
    pub tokens: T,
    pub sessions: S,
    pub audit: D,
    pub hasher: PasswordHasher,
}

impl<A: AccountRepository, T: ResetTokenRepository, S: SessionRepository, D: AuditRepository>
    ResetPasswordUseCase<A, T, S, D>
{
    pub async fn execute(
        &self,
        input: ResetPasswordInput,
        client: &ClientInfo,
    ) -> Result<(), AuthServiceError> {
        let now = Utc::now();
        let token = self
            .tokens
            .find(&input.token)
            .await?
            .ok_or(AuthServiceError::InvalidOrExpiredToken)?;

        if token.is_expired(now) {
            self.audit_failure(&token, "token_expired", client).await;
            return Err(AuthServiceError::InvalidOrExpiredToken);
        }
        if token.used_at.is_some() {
            self.audit_failure(&token, "token_already_used", client).await;
            return Err(AuthServiceError::TokenAlreadyUsed);
        }
        validate_password(&input.new_password)?;

        let account = self
            .accounts
            .find_by_id(token.account_id)
            .await?
            .ok_or(AuthServiceError::InvalidOrExpiredToken)?;

        let hash = self.hasher.hash(&input.new_password).await?;

        // Conditional update; only one concurrent redeemer gets `true`.
        let consumed_at = Utc::now();
        if !self.tokens.consume(&token.token, consumed_at).await? {
            return Err(self.lost_consume(&token, client).await);
        }

        self.accounts.set_password(account.id, &hash, consumed_at).await?;

        let revoked = self.sessions.delete_for_account(account.id).await?;
        tracing::info!(account_id = %account.id, revoked, "password reset completed");

        record(
            &self.audit,
            AuditEvent::success(AuditAction::PasswordResetComplete, AuthProvider::Local)
                .account(&account)
                .client(client),
        )
        .await;

        Ok(())
    }

    /// Classifies a failed consume from a fresh read: the token either expired while the
    /// password was hashed or another redeemer got there first.
    async fn lost_consume(
        &self,
        token: &PasswordResetToken,
        client: &ClientInfo,
    ) -> AuthServiceError {
        let already_used = match self.tokens.find(&token.token).await {
            Ok(current) => current.is_some_and(|t| t.used_at.is_some()),
            Err(e) => return e,
        };
        if already_used {
            self.audit_failure(token, "token_already_used", client).await;
            AuthServiceError::TokenAlreadyUsed
        } else {
            self.audit_failure(token, "token_expired", client).await;
            AuthServiceError::InvalidOrExpiredToken
        }
    }

    async fn audit_failure(&self, token: &PasswordResetToken, reason: &str, client: &ClientInfo) {
        record(
            &self.audit,
            AuditEvent::failure(
                AuditAction::PasswordResetComplete,
                AuthProvider::Local,
                reason,
            )
            .account_id(token.account_id)
            .client(client),
        )
        .await;
    }
}
