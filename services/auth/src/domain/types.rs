use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealdesk_domain::account::{AccountOrigin, email_domain};
use dealdesk_domain::audit::{AuditAction, AuthProvider};
use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;
use dealdesk_domain::role::Role;

// ── Account ──────────────────────────────────────────────────────────────────

/// Identity record backing both login methods. `email` is always normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: Option<String>,
    pub origin: AccountOrigin,
    pub federated_subject: Option<String>,
    pub federated_tenant: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub disabled: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new_local(
        email: String,
        password_hash: String,
        first_name: Option<String>,
        last_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            email,
            password_hash: Some(password_hash),
            origin: AccountOrigin::Local,
            federated_subject: None,
            federated_tenant: None,
            first_name,
            last_name,
            disabled: false,
            email_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub fn new_federated(
        email: String,
        subject: String,
        tenant: String,
        first_name: Option<String>,
        last_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            email,
            password_hash: None,
            origin: AccountOrigin::Federated,
            federated_subject: Some(subject),
            federated_tenant: Some(tenant),
            first_name,
            last_name,
            disabled: false,
            email_verified: true,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn is_federation_linked(&self) -> bool {
        self.federated_subject.is_some()
    }

    /// "First Last" when either is known, else the email.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    /// Origin an account should carry given its current password state.
    pub fn settle_origin(&mut self) {
        if !self.has_password() && self.is_federation_linked() {
            self.origin = AccountOrigin::Federated;
        }
    }
}

/// External identity attached to an account. Names left `None` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationLink {
    pub subject: String,
    pub tenant: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// ── Password reset ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub token: String,
    pub account_id: AccountId,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(token: String, account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            token,
            account_id,
            expires_at: now + Duration::seconds(RESET_TOKEN_TTL_SECS),
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// ── Federation policy ────────────────────────────────────────────────────────

/// Federated-login admission policy. `Default` is the permissive policy that applies
/// when no record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationPolicy {
    pub allowed_tenants: Vec<String>,
    pub allowed_email_domains: Vec<String>,
    pub default_role_for_sso: Role,
    pub auto_provision_users: bool,
    pub federation_only: bool,
}

impl Default for FederationPolicy {
    fn default() -> Self {
        Self {
            allowed_tenants: Vec::new(),
            allowed_email_domains: Vec::new(),
            default_role_for_sso: Role::LOWEST,
            auto_provision_users: true,
            federation_only: false,
        }
    }
}

impl FederationPolicy {
    pub fn permits_tenant(&self, tenant: &str) -> bool {
        self.allowed_tenants.is_empty()
            || self
                .allowed_tenants
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tenant))
    }

    pub fn permits_email(&self, email: &str) -> bool {
        if self.allowed_email_domains.is_empty() {
            return true;
        }
        match email_domain(email) {
            Some(domain) => self
                .allowed_email_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&domain)),
            None => false,
        }
    }

    /// Trim, lower-case, drop blanks and duplicates in both allow-lists.
    pub fn normalized(mut self) -> Self {
        fn clean(values: Vec<String>) -> Vec<String> {
            let mut out: Vec<String> = Vec::with_capacity(values.len());
            for v in values {
                let v = v.trim().trim_start_matches('@').to_lowercase();
                if !v.is_empty() && !out.contains(&v) {
                    out.push(v);
                }
            }
            out
        }
        self.allowed_tenants = clean(self.allowed_tenants);
        self.allowed_email_domains = clean(self.allowed_email_domains);
        self
    }
}

/// Policy as stored, with bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPolicy {
    pub policy: FederationPolicy,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<AccountId>,
}

// ── Audit ────────────────────────────────────────────────────────────────────

/// Caller metadata attached to audit events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub account_id: Option<AccountId>,
    pub email: Option<String>,
    pub action: AuditAction,
    pub provider: AuthProvider,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn success(action: AuditAction, provider: AuthProvider) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id: None,
            email: None,
            action,
            provider,
            success: true,
            failure_reason: None,
            metadata: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn failure(action: AuditAction, provider: AuthProvider, reason: &str) -> Self {
        Self {
            success: false,
            failure_reason: Some(reason.to_owned()),
            ..Self::success(action, provider)
        }
    }

    pub fn account(mut self, account: &Account) -> Self {
        self.account_id = Some(account.id);
        self.email = Some(account.email.clone());
        self
    }

    pub fn account_id(mut self, id: AccountId) -> Self {
        self.account_id = Some(id);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_owned());
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub account_id: Option<AccountId>,
    pub action: Option<AuditAction>,
    pub page: PageRequest,
}

// ── Session ──────────────────────────────────────────────────────────────────

/// Server-side session record; immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub account_id: AccountId,
    pub email: String,
    pub display_name: String,
    pub origin: AccountOrigin,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// ── Federation ───────────────────────────────────────────────────────────────

/// Anti-CSRF handshake for one federation redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingState {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub redirect_to: Option<String>,
}

impl PendingState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::seconds(PENDING_STATE_TTL_SECS)
    }
}

/// One RSA key from the provider's published key set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SigningKey {
    pub kid: String,
    #[serde(default)]
    pub kty: Option<String>,
    pub n: String,
    pub e: String,
}

/// Tokens returned by the authorization-code exchange.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub id_token: String,
    pub access_token: String,
}

/// Profile returned by the provider's user-profile API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl FederatedProfile {
    /// Mailbox address, falling back to the principal name.
    pub fn email(&self) -> Option<&str> {
        non_blank(self.mail.as_deref()).or_else(|| non_blank(self.user_principal_name.as_deref()))
    }
}

/// Claims read from a verified ID token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl IdTokenClaims {
    /// Email claim, falling back to the preferred username.
    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_deref()).or_else(|| non_blank(self.preferred_username.as_deref()))
    }

    /// Stable subject: the directory object id when present, else `sub`.
    pub fn subject(&self) -> Option<&str> {
        non_blank(self.oid.as_deref()).or_else(|| non_blank(self.sub.as_deref()))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Tenant sentinel that fails every non-empty allow-list.
pub const UNKNOWN_TENANT: &str = "unknown";

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt work factor for stored password hashes.
pub const BCRYPT_COST: u32 = 12;

/// Password reset token lifetime in seconds (24 hours).
pub const RESET_TOKEN_TTL_SECS: i64 = 86400;

/// Pending federation state lifetime in seconds (10 minutes).
pub const PENDING_STATE_TTL_SECS: i64 = 600;

/// Signing-key cache lifetime per tenant (24 hours).
pub const JWKS_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(86400);

/// Clock skew tolerated on ID token `exp`, `nbf` and `iat`.
pub const ID_TOKEN_LEEWAY_SECS: u64 = 300;
