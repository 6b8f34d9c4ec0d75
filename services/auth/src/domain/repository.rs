#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};

use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;
use dealdesk_domain::role::Role;

use crate::domain::types::{
    Account, AuditEvent, AuditQuery, FederatedProfile, FederationLink, FederationPolicy,
    PasswordResetToken, PendingState, ProviderTokens, Session, SigningKey, StoredPolicy,
};
use crate::error::AuthServiceError;

/// Repository for accounts.
pub trait AccountRepository: Send + Sync {
    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthServiceError>;

    /// Insert a new account. A concurrent insert of the same email yields `DuplicateEmail`.
    async fn create(&self, account: &Account) -> Result<(), AuthServiceError>;

    // Each update below writes only the columns it names.

    /// Stamp a successful sign-in.
    async fn record_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError>;

    async fn set_password(
        &self,
        id: AccountId,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError>;

    /// The updated account, or `None` when it does not exist.
    async fn set_disabled(
        &self,
        id: AccountId,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError>;

    /// Attach the external identity. The origin becomes `federated` only when the
    /// stored account has no password.
    async fn link_federation(
        &self,
        id: AccountId,
        link: &FederationLink,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError>;

    /// Clear the external identity and make the account `local`.
    async fn unlink_federation(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError>;

    /// Page of accounts ordered by creation time, plus the total count.
    async fn list(&self, page: PageRequest) -> Result<(Vec<Account>, u64), AuthServiceError>;
}

/// Repository for password reset tokens.
pub trait ResetTokenRepository: Send + Sync {
    async fn create(&self, token: &PasswordResetToken) -> Result<(), AuthServiceError>;

    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>, AuthServiceError>;

    /// Mark the token used only if it is still unused and unexpired at `now`.
    /// Returns `true` for exactly one caller per token.
    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AuthServiceError>;
}

/// Storage for the singleton federation policy.
pub trait PolicyRepository: Send + Sync {
    /// The stored policy, or `None` when it was never written.
    async fn get(&self) -> Result<Option<StoredPolicy>, AuthServiceError>;

    async fn put(
        &self,
        policy: &FederationPolicy,
        updated_by: Option<AccountId>,
    ) -> Result<StoredPolicy, AuthServiceError>;
}

/// Append-only audit trail.
pub trait AuditRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthServiceError>;

    /// Newest first.
    async fn list(&self, query: &AuditQuery) -> Result<(Vec<AuditEvent>, u64), AuthServiceError>;
}

/// Server-side session store.
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), AuthServiceError>;

    async fn find(&self, id: &str) -> Result<Option<Session>, AuthServiceError>;

    async fn delete(&self, id: &str) -> Result<(), AuthServiceError>;

    /// Delete every session of an account. Returns how many were removed.
    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, AuthServiceError>;
}

/// CRM profile directory holding each account's role.
pub trait ProfileDirectory: Send + Sync {
    async fn find_role(&self, account_id: AccountId) -> Result<Option<Role>, AuthServiceError>;

    /// Create the profile with `role` unless one already exists; return the effective role.
    async fn ensure_profile(
        &self,
        account_id: AccountId,
        role: Role,
    ) -> Result<Role, AuthServiceError>;
}

/// Single-use store for pending federation states.
pub trait PendingStateStore: Send + Sync {
    async fn insert(&self, state: &PendingState) -> Result<(), AuthServiceError>;

    /// Remove and return the state. A second call for the same value returns `None`.
    async fn take(&self, value: &str) -> Result<Option<PendingState>, AuthServiceError>;
}

/// Port for the external identity provider's HTTP endpoints.
pub trait IdentityProvider: Send + Sync {
    /// Authorization endpoint URL carrying `state`.
    fn authorize_url(&self, state: &str) -> Result<String, AuthServiceError>;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthServiceError>;

    async fn fetch_profile(&self, access_token: &str)
    -> Result<FederatedProfile, AuthServiceError>;

    /// Directory id of the signed-in user's organization, if the provider returns one.
    async fn fetch_organization_tenant(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, AuthServiceError>;
}

/// Source of the provider's published signing keys, per tenant.
pub trait SigningKeySource: Send + Sync {
    async fn fetch_signing_keys(&self, tenant: &str) -> Result<Vec<SigningKey>, AuthServiceError>;
}
