use std::sync::Arc;

use chrono::Utc;

use dealdesk_domain::account::normalize_email;
use dealdesk_domain::audit::{AuditAction, AuthProvider};

use crate::domain::repository::{
    AccountRepository, AuditRepository, IdentityProvider, PendingStateStore, PolicyRepository,
    ProfileDirectory, SessionRepository, SigningKeySource,
};
use crate::domain::types::{Account, AuditEvent, ClientInfo, UNKNOWN_TENANT, non_blank};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;
use crate::usecase::binder::{BindFederatedIdentityUseCase, FederatedIdentity};
use crate::usecase::id_token::IdTokenVerifier;
use crate::usecase::password::PasswordHasher;
use crate::usecase::policy::load_policy;

/// How the caller is proving its identity.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    Local { email: String, password: String },
    Federated { code: String, state: String },
}

#[derive(Debug)]
pub struct Authenticated {
    pub account: Account,
    /// Post-login path captured when the federation redirect was initiated.
    pub redirect_to: Option<String>,
}

/// Configured identity provider plus the verifier holding its key cache.
pub struct Federation<I: IdentityProvider, K: SigningKeySource> {
    pub provider: I,
    pub verifier: Arc<IdTokenVerifier<K>>,
    /// Concrete tenant from configuration, used when the token and directory name none.
    pub default_tenant: Option<String>,
}

/// Single entry point for both login methods.
pub struct AuthenticateUseCase<A, P, R, S, T, D, I, K>
where
    A: AccountRepository,
    P: PolicyRepository,
    R: ProfileDirectory,
    S: SessionRepository,
    T: PendingStateStore,
    D: AuditRepository,
    I: IdentityProvider,
    K: SigningKeySource,
{
    pub accounts: A,
    pub policies: P,
    pub profiles: R,
    pub sessions: S,
    pub states: T,
    pub audit: D,
    pub hasher: PasswordHasher,
    pub federation: Option<Federation<I, K>>,
}

impl<A, P, R, S, T, D, I, K> AuthenticateUseCase<A, P, R, S, T, D, I, K>
where
    A: AccountRepository,
    P: PolicyRepository,
    R: ProfileDirectory,
    S: SessionRepository,
    T: PendingStateStore,
    D: AuditRepository,
    I: IdentityProvider,
    K: SigningKeySource,
{
    pub async fn execute(
        self,
        method: AuthMethod,
        client: &ClientInfo,
    ) -> Result<Authenticated, AuthServiceError> {
        match method {
            AuthMethod::Local { email, password } => {
                let account = self.local(&email, &password, client).await?;
                Ok(Authenticated {
                    account,
                    redirect_to: None,
                })
            }
            AuthMethod::Federated { code, state } => self.federated(&code, &state, client).await,
        }
    }

    // ── Local ────────────────────────────────────────────────────────────────

    async fn local(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let email = normalize_email(email);
        let fail = |reason: &str| {
            AuditEvent::failure(AuditAction::Login, AuthProvider::Local, reason)
                .email(&email)
                .client(client)
        };

        if load_policy(&self.policies).await?.federation_only {
            record(&self.audit, fail("local_auth_disabled")).await;
            return Err(AuthServiceError::LocalAuthDisabled);
        }

        let Some(mut account) = self.accounts.find_by_email(&email).await? else {
            record(&self.audit, fail("account_not_found")).await;
            return Err(AuthServiceError::InvalidCredentials);
        };

        if account.disabled {
            let evicted = self.sessions.delete_for_account(account.id).await?;
            tracing::info!(account_id = %account.id, evicted, "login refused for disabled account");
            record(&self.audit, fail("account_disabled").account(&account)).await;
            return Err(AuthServiceError::AccountDisabled);
        }

        let Some(hash) = account.password_hash.as_deref().filter(|h| !h.is_empty()) else {
            record(&self.audit, fail("no_password_set").account(&account)).await;
            return Err(AuthServiceError::NoPasswordSet);
        };

        if !self.hasher.verify(password, hash).await? {
            record(&self.audit, fail("invalid_password").account(&account)).await;
            return Err(AuthServiceError::InvalidCredentials);
        }

        let now = Utc::now();
        self.accounts.record_login(account.id, now).await?;
        account.last_login_at = Some(now);
        account.updated_at = now;

        record(
            &self.audit,
            AuditEvent::success(AuditAction::Login, AuthProvider::Local)
                .account(&account)
                .client(client),
        )
        .await;
        Ok(account)
    }

    // ── Federated ────────────────────────────────────────────────────────────

    async fn federated(
        self,
        code: &str,
        state: &str,
        client: &ClientInfo,
    ) -> Result<Authenticated, AuthServiceError> {
        let Some(federation) = self.federation.as_ref() else {
            return Err(AuthServiceError::FederationNotConfigured);
        };

        let pending = match self.states.take(state).await? {
            Some(pending) if !pending.is_expired(Utc::now()) => pending,
            _ => {
                self.federation_failure(None, "invalid_state", client).await;
                return Err(AuthServiceError::InvalidState);
            }
        };

        let identity = match self.verify_callback(federation, code).await {
            Ok(identity) => identity,
            Err((err, email)) => {
                let reason = err.kind().to_ascii_lowercase();
                self.federation_failure(email.as_deref(), &reason, client)
                    .await;
                return Err(err);
            }
        };

        let binder = BindFederatedIdentityUseCase {
            accounts: self.accounts,
            policies: self.policies,
            profiles: self.profiles,
            sessions: self.sessions,
            audit: self.audit,
        };
        let account = binder.execute(&identity, client).await?;

        Ok(Authenticated {
            account,
            redirect_to: pending.redirect_to,
        })
    }

    /// Exchange the code, verify the ID token, fetch the profile and cross-check them.
    /// Failures carry the profile email when one was already known.
    async fn verify_callback(
        &self,
        federation: &Federation<I, K>,
        code: &str,
    ) -> Result<FederatedIdentity, (AuthServiceError, Option<String>)> {
        let tokens = federation
            .provider
            .exchange_code(code)
            .await
            .map_err(|e| (e, None))?;

        // Signature first; nothing else is fetched for a token that fails verification.
        let claims = federation
            .verifier
            .verify(&tokens.id_token)
            .await
            .map_err(|e| (e, None))?;

        let profile = federation
            .provider
            .fetch_profile(&tokens.access_token)
            .await
            .map_err(|e| (e, None))?;

        let Some(profile_email) = profile.email().map(normalize_email) else {
            return Err((AuthServiceError::NoEmailInProfile, None));
        };

        match claims.email() {
            Some(claim_email) if claim_email.eq_ignore_ascii_case(&profile_email) => {}
            claim_email => {
                tracing::warn!(
                    claim_email = ?claim_email,
                    profile_email = %profile_email,
                    "id token email does not match profile email"
                );
                return Err((AuthServiceError::ClaimProfileMismatch, Some(profile_email)));
            }
        }

        let subject = claims
            .subject()
            .or_else(|| non_blank(profile.id.as_deref()))
            .map(str::to_owned)
            .ok_or((AuthServiceError::InvalidIdToken, Some(profile_email.clone())))?;

        let tenant = self
            .resolve_tenant(federation, claims.tid.as_deref(), &tokens.access_token)
            .await;

        Ok(FederatedIdentity {
            profile,
            subject,
            tenant,
        })
    }

    /// Token `tid`, then the directory's organization, then configuration, then `unknown`.
    async fn resolve_tenant(
        &self,
        federation: &Federation<I, K>,
        tid: Option<&str>,
        access_token: &str,
    ) -> String {
        if let Some(tid) = non_blank(tid) {
            return tid.to_owned();
        }
        match federation
            .provider
            .fetch_organization_tenant(access_token)
            .await
        {
            Ok(Some(tenant)) if !tenant.trim().is_empty() => return tenant,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = ?e, "organization lookup failed"),
        }
        federation
            .default_tenant
            .clone()
            .unwrap_or_else(|| UNKNOWN_TENANT.to_owned())
    }

    async fn federation_failure(&self, email: Option<&str>, reason: &str, client: &ClientInfo) {
        let mut event = AuditEvent::failure(AuditAction::SsoLogin, AuthProvider::Microsoft, reason)
            .client(client);
        if let Some(email) = email {
            event = event.email(email);
        }
        record(&self.audit, event).await;
    }
}
