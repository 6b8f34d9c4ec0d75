use chrono::{DateTime, Utc};
use serde::Serialize;

use dealdesk_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};
use dealdesk_domain::account::AccountOrigin;
use dealdesk_domain::audit::{AuditAction, AuthProvider};
use dealdesk_domain::id::AccountId;

use crate::domain::types::{Account, AuditEvent, FederationPolicy, StoredPolicy};
use crate::usecase::admin::Page;

/// Account as returned to clients, with the authentication metadata admins need.
/// Never carries the password hash.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub origin: AccountOrigin,
    pub has_password: bool,
    pub federation_linked: bool,
    pub federated_tenant: Option<String>,
    pub disabled: bool,
    pub email_verified: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            email: a.email.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            origin: a.origin,
            has_password: a.has_password(),
            federation_linked: a.is_federation_linked(),
            federated_tenant: a.federated_tenant.clone(),
            disabled: a.disabled,
            email_verified: a.email_verified,
            created_at: a.created_at,
            last_login_at: a.last_login_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyView {
    #[serde(flatten)]
    pub policy: FederationPolicy,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<AccountId>,
}

impl From<Option<StoredPolicy>> for PolicyView {
    fn from(stored: Option<StoredPolicy>) -> Self {
        match stored {
            Some(s) => Self {
                policy: s.policy,
                updated_at: Some(s.updated_at),
                updated_by: s.updated_by,
            },
            None => Self {
                policy: FederationPolicy::default(),
                updated_at: None,
                updated_by: None,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventView {
    pub id: uuid::Uuid,
    pub account_id: Option<AccountId>,
    pub email: Option<String>,
    pub action: AuditAction,
    pub provider: AuthProvider,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventView {
    fn from(e: AuditEvent) -> Self {
        Self {
            id: e.id,
            account_id: e.account_id,
            email: e.email,
            action: e.action,
            provider: e.provider,
            success: e.success,
            failure_reason: e.failure_reason,
            metadata: e.metadata,
            ip_address: e.ip_address,
            user_agent: e.user_agent,
            created_at: e.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PageView<T> {
    pub fn from_page<U>(page: Page<U>, map: impl FnMut(U) -> T) -> Self {
        Self {
            items: page.items.into_iter().map(map).collect(),
            total: page.total,
            page: page.page.page,
            per_page: page.page.per_page,
        }
    }
}
