use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use dealdesk_auth::domain::repository::{
    AccountRepository, AuditRepository, IdentityProvider, PolicyRepository, ProfileDirectory,
    ResetTokenRepository, SessionRepository, SigningKeySource,
};
use dealdesk_auth::domain::types::{
    Account, AuditEvent, AuditQuery, ClientInfo, FederatedProfile, FederationLink,
    FederationPolicy, PasswordResetToken, ProviderTokens, Session, SigningKey, StoredPolicy,
};
use dealdesk_auth::error::AuthServiceError;
use dealdesk_auth::infra::state_store::MemoryStateStore;
use dealdesk_auth::usecase::authenticate::{AuthenticateUseCase, Federation};
use dealdesk_auth::usecase::id_token::IdTokenVerifier;
use dealdesk_auth::usecase::password::PasswordHasher;
use dealdesk_auth::usecase::session::AuthorizeUseCase;
use dealdesk_domain::account::AccountOrigin;
use dealdesk_domain::audit::AuditAction;
use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;
use dealdesk_domain::role::Role;
use dealdesk_testing::idp::{TEST_CLIENT_ID, TEST_KID, TEST_RSA_E, TEST_RSA_N, TEST_TENANT_ID};

pub const TEST_PASSWORD: &str = "correct horse";

/// bcrypt's minimum cost keeps the suite fast.
pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(4)
}

pub fn test_client() -> ClientInfo {
    ClientInfo {
        ip_address: Some("203.0.113.7".to_owned()),
        user_agent: Some("integration-test".to_owned()),
    }
}

pub async fn local_account(email: &str) -> Account {
    let hash = test_hasher().hash(TEST_PASSWORD).await.unwrap();
    Account::new_local(
        email.to_owned(),
        hash,
        Some("Alice".to_owned()),
        Some("Doe".to_owned()),
        Utc::now(),
    )
}

pub fn federated_account(email: &str) -> Account {
    Account::new_federated(
        email.to_owned(),
        "subject-1".to_owned(),
        TEST_TENANT_ID.to_owned(),
        None,
        None,
        Utc::now(),
    )
}

// ── MockAccounts ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAccounts {
    pub accounts: Arc<Mutex<Vec<Account>>>,
    pub writes: Arc<AtomicUsize>,
}

impl MockAccounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Arc::new(Mutex::new(accounts)),
            writes: Arc::default(),
        }
    }

    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    pub fn by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Applies `change` to the stored row under the lock, like a column-scoped UPDATE.
    fn modify(&self, id: AccountId, change: impl FnOnce(&mut Account)) -> Option<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        self.writes.fetch_add(1, Ordering::SeqCst);
        let slot = accounts.iter_mut().find(|a| a.id == id)?;
        change(slot);
        Some(slot.clone())
    }

    pub fn set_disabled_now(&self, id: AccountId) {
        self.modify(id, |a| a.disabled = true);
    }
}

// ── DisabledMidLogin ─────────────────────────────────────────────────────────

/// Account store where an admin disables the account right after every email lookup,
/// so the caller holds a stale enabled snapshot for the rest of its request.
#[derive(Clone, Default)]
pub struct DisabledMidLogin(pub MockAccounts);

impl AccountRepository for DisabledMidLogin {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError> {
        let found = self.0.find_by_email(email).await?;
        if let Some(account) = &found {
            self.0.set_disabled_now(account.id);
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthServiceError> {
        self.0.find_by_id(id).await
    }

    async fn create(&self, account: &Account) -> Result<(), AuthServiceError> {
        self.0.create(account).await
    }

    async fn record_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        self.0.record_login(id, now).await
    }

    async fn set_password(
        &self,
        id: AccountId,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        self.0.set_password(id, hash, now).await
    }

    async fn set_disabled(
        &self,
        id: AccountId,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        self.0.set_disabled(id, disabled, now).await
    }

    async fn link_federation(
        &self,
        id: AccountId,
        link: &FederationLink,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        self.0.link_federation(id, link, now).await
    }

    async fn unlink_federation(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        self.0.unlink_federation(id, now).await
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<Account>, u64), AuthServiceError> {
        self.0.list(page).await
    }
}

impl AccountRepository for MockAccounts {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.by_email(email))
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.get(id))
    }

    async fn create(&self, account: &Account) -> Result<(), AuthServiceError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(AuthServiceError::DuplicateEmail);
        }
        accounts.push(account.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        self.modify(id, |a| {
            a.last_login_at = Some(now);
            a.updated_at = now;
        });
        Ok(())
    }

    async fn set_password(
        &self,
        id: AccountId,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        self.modify(id, |a| {
            a.password_hash = Some(hash.to_owned());
            a.updated_at = now;
        });
        Ok(())
    }

    async fn set_disabled(
        &self,
        id: AccountId,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.modify(id, |a| {
            a.disabled = disabled;
            a.updated_at = now;
        }))
    }

    async fn link_federation(
        &self,
        id: AccountId,
        link: &FederationLink,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.modify(id, |a| {
            a.federated_subject = Some(link.subject.clone());
            a.federated_tenant = Some(link.tenant.clone());
            if let Some(first) = &link.first_name {
                a.first_name = Some(first.clone());
            }
            if let Some(last) = &link.last_name {
                a.last_name = Some(last.clone());
            }
            a.updated_at = now;
            a.settle_origin();
        }))
    }

    async fn unlink_federation(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.modify(id, |a| {
            a.federated_subject = None;
            a.federated_tenant = None;
            a.origin = AccountOrigin::Local;
            a.updated_at = now;
        }))
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<Account>, u64), AuthServiceError> {
        let accounts = self.accounts.lock().unwrap();
        let items = accounts
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok((items, accounts.len() as u64))
    }
}

// ── MockResetTokens ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockResetTokens {
    pub tokens: Arc<Mutex<Vec<PasswordResetToken>>>,
}

impl MockResetTokens {
    pub fn new(tokens: Vec<PasswordResetToken>) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
        }
    }
}

impl ResetTokenRepository for MockResetTokens {
    async fn create(&self, token: &PasswordResetToken) -> Result<(), AuthServiceError> {
        self.tokens.lock().unwrap().push(token.clone());
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>, AuthServiceError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AuthServiceError> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens
            .iter_mut()
            .find(|t| t.token == token && t.used_at.is_none() && t.expires_at > now)
        {
            Some(t) => {
                t.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── MockPolicy ───────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockPolicy {
    pub stored: Arc<Mutex<Option<StoredPolicy>>>,
}

impl MockPolicy {
    pub fn with(policy: FederationPolicy) -> Self {
        Self {
            stored: Arc::new(Mutex::new(Some(StoredPolicy {
                policy,
                updated_at: Utc::now(),
                updated_by: None,
            }))),
        }
    }
}

impl PolicyRepository for MockPolicy {
    async fn get(&self) -> Result<Option<StoredPolicy>, AuthServiceError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn put(
        &self,
        policy: &FederationPolicy,
        updated_by: Option<AccountId>,
    ) -> Result<StoredPolicy, AuthServiceError> {
        let stored = StoredPolicy {
            policy: policy.clone(),
            updated_at: Utc::now(),
            updated_by,
        };
        *self.stored.lock().unwrap() = Some(stored.clone());
        Ok(stored)
    }
}

// ── MockAudit ────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAudit {
    pub events: Arc<Mutex<Vec<AuditEvent>>>,
    /// When set, every append fails.
    pub broken: bool,
}

impl MockAudit {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self, action: AuditAction) -> Option<AuditEvent> {
        self.events()
            .into_iter()
            .rev()
            .find(|e| e.action == action)
    }
}

impl AuditRepository for MockAudit {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthServiceError> {
        if self.broken {
            return Err(AuthServiceError::Internal(anyhow::anyhow!("audit store down")));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn list(&self, query: &AuditQuery) -> Result<(Vec<AuditEvent>, u64), AuthServiceError> {
        let matching: Vec<AuditEvent> = self
            .events()
            .into_iter()
            .rev()
            .filter(|e| query.account_id.is_none_or(|id| e.account_id == Some(id)))
            .filter(|e| query.action.is_none_or(|a| e.action == a))
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .collect();
        Ok((items, total))
    }
}

// ── MockSessions ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockSessions {
    pub sessions: Arc<Mutex<Vec<Session>>>,
}

impl MockSessions {
    pub fn count_for(&self, account_id: AccountId) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.account_id == account_id)
            .count()
    }
}

impl SessionRepository for MockSessions {
    async fn create(&self, session: &Session) -> Result<(), AuthServiceError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Session>, AuthServiceError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn delete(&self, id: &str) -> Result<(), AuthServiceError> {
        self.sessions.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }

    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, AuthServiceError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| s.account_id != account_id);
        Ok((before - sessions.len()) as u64)
    }
}

// ── MockProfiles ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockProfiles {
    pub roles: Arc<Mutex<Vec<(AccountId, Role)>>>,
}

impl MockProfiles {
    pub fn with_role(self, account_id: AccountId, role: Role) -> Self {
        self.roles.lock().unwrap().push((account_id, role));
        self
    }

    pub fn role_of(&self, account_id: AccountId) -> Option<Role> {
        self.roles
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == account_id)
            .map(|(_, role)| *role)
    }
}

impl ProfileDirectory for MockProfiles {
    async fn find_role(&self, account_id: AccountId) -> Result<Option<Role>, AuthServiceError> {
        Ok(self.role_of(account_id))
    }

    async fn ensure_profile(
        &self,
        account_id: AccountId,
        role: Role,
    ) -> Result<Role, AuthServiceError> {
        let mut roles = self.roles.lock().unwrap();
        if let Some((_, existing)) = roles.iter().find(|(id, _)| *id == account_id) {
            return Ok(*existing);
        }
        roles.push((account_id, role));
        Ok(role)
    }
}

// ── MockProvider ─────────────────────────────────────────────────────────────

/// Identity provider returning canned tokens and profile, counting profile fetches.
#[derive(Clone)]
pub struct MockProvider {
    pub id_token: String,
    pub profile: FederatedProfile,
    pub organization: Option<String>,
    pub profile_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(id_token: String, profile: FederatedProfile) -> Self {
        Self {
            id_token,
            profile,
            organization: None,
            profile_calls: Arc::default(),
        }
    }

    pub fn profile_call_count(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for MockProvider {
    fn authorize_url(&self, state: &str) -> Result<String, AuthServiceError> {
        Ok(format!("https://idp.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthServiceError> {
        if code == "bad-code" {
            return Err(AuthServiceError::FederationUnavailable);
        }
        Ok(ProviderTokens {
            id_token: self.id_token.clone(),
            access_token: "access-token".to_owned(),
        })
    }

    async fn fetch_profile(
        &self,
        _access_token: &str,
    ) -> Result<FederatedProfile, AuthServiceError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.profile.clone())
    }

    async fn fetch_organization_tenant(
        &self,
        _access_token: &str,
    ) -> Result<Option<String>, AuthServiceError> {
        Ok(self.organization.clone())
    }
}

pub fn profile_for(email: &str) -> FederatedProfile {
    FederatedProfile {
        id: Some("graph-id-1".to_owned()),
        mail: Some(email.to_owned()),
        user_principal_name: Some(email.to_owned()),
        given_name: Some("Alice".to_owned()),
        surname: Some("Doe".to_owned()),
        display_name: Some("Alice Doe".to_owned()),
    }
}

// ── StaticKeys ───────────────────────────────────────────────────────────────

/// Publishes the test RSA key.
pub struct StaticKeys;

impl SigningKeySource for StaticKeys {
    async fn fetch_signing_keys(&self, _tenant: &str) -> Result<Vec<SigningKey>, AuthServiceError> {
        Ok(vec![SigningKey {
            kid: TEST_KID.to_owned(),
            kty: Some("RSA".to_owned()),
            n: TEST_RSA_N.to_owned(),
            e: TEST_RSA_E.to_owned(),
        }])
    }
}

pub fn test_verifier() -> Arc<IdTokenVerifier<StaticKeys>> {
    Arc::new(IdTokenVerifier::new(
        StaticKeys,
        TEST_CLIENT_ID,
        TEST_TENANT_ID,
    ))
}

// ── Fixture ──────────────────────────────────────────────────────────────────

/// Every port wired to shared in-memory mocks.
#[derive(Clone, Default)]
pub struct Fixture {
    pub accounts: MockAccounts,
    pub tokens: MockResetTokens,
    pub policies: MockPolicy,
    pub audit: MockAudit,
    pub sessions: MockSessions,
    pub profiles: MockProfiles,
    pub states: MemoryStateStore,
}

pub type TestAuthenticate = AuthenticateUseCase<
    MockAccounts,
    MockPolicy,
    MockProfiles,
    MockSessions,
    MemoryStateStore,
    MockAudit,
    MockProvider,
    StaticKeys,
>;

impl Fixture {
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: MockAccounts::new(accounts),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: FederationPolicy) -> Self {
        self.policies = MockPolicy::with(policy);
        self
    }

    pub fn authenticate(&self, provider: Option<MockProvider>) -> TestAuthenticate {
        AuthenticateUseCase {
            accounts: self.accounts.clone(),
            policies: self.policies.clone(),
            profiles: self.profiles.clone(),
            sessions: self.sessions.clone(),
            states: self.states.clone(),
            audit: self.audit.clone(),
            hasher: test_hasher(),
            federation: provider.map(|provider| Federation {
                provider,
                verifier: test_verifier(),
                default_tenant: None,
            }),
        }
    }

    pub fn authorize(&self) -> AuthorizeUseCase<MockSessions, MockAccounts, MockProfiles, MockPolicy> {
        AuthorizeUseCase {
            sessions: self.sessions.clone(),
            accounts: self.accounts.clone(),
            profiles: self.profiles.clone(),
            policies: self.policies.clone(),
        }
    }
}
