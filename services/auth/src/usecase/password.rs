use chrono::Utc;

use dealdesk_domain::account::{is_plausible_email, normalize_email};
use dealdesk_domain::audit::{AuditAction, AuthProvider};

use crate::domain::repository::{AccountRepository, AuditRepository, PolicyRepository};
use crate::domain::types::{Account, AuditEvent, BCRYPT_COST, ClientInfo, MIN_PASSWORD_LEN};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;
use crate::usecase::policy::load_policy;

/// bcrypt hasher. Hashing runs on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    pub cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: BCRYPT_COST }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthServiceError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?
            .map_err(|e| AuthServiceError::Internal(e.into()))
    }

    /// A malformed stored hash verifies as `false`.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthServiceError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let result = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        match result {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is unreadable");
                Ok(false)
            }
        }
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthServiceError::WeakPassword);
    }
    Ok(())
}

/// Trim optional profile text, treating blank as absent.
pub(crate) fn clean_name(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ── Register ─────────────────────────────────────────────────────────────────

pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct RegisterUseCase<A: AccountRepository, P: PolicyRepository, D: AuditRepository> {
    pub accounts: A,
    pub policies: P,
    pub audit: D,
    pub hasher: PasswordHasher,
}

impl<A: AccountRepository, P: PolicyRepository, D: AuditRepository> RegisterUseCase<A, P, D> {
    pub async fn execute(
        &self,
        input: RegisterInput,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let email = normalize_email(&input.email);
        if !is_plausible_email(&email) {
            return Err(AuthServiceError::InvalidEmail);
        }
        validate_password(&input.password)?;

        if load_policy(&self.policies).await?.federation_only {
            record(
                &self.audit,
                AuditEvent::failure(AuditAction::Register, AuthProvider::Local, "local_auth_disabled")
                    .email(&email)
                    .client(client),
            )
            .await;
            return Err(AuthServiceError::LocalAuthDisabled);
        }

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthServiceError::DuplicateEmail);
        }

        let hash = self.hasher.hash(&input.password).await?;
        let account = Account::new_local(
            email,
            hash,
            clean_name(input.first_name),
            clean_name(input.last_name),
            Utc::now(),
        );
        self.accounts.create(&account).await?;

        record(
            &self.audit,
            AuditEvent::success(AuditAction::Register, AuthProvider::Local)
                .account(&account)
                .client(client),
        )
        .await;

        Ok(account)
    }
}
