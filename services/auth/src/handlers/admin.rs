use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use dealdesk_domain::audit::AuditAction;
use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;
use dealdesk_domain::role::Role;

use crate::domain::types::{AuditQuery, FederationPolicy};
use crate::error::AuthServiceError;
use crate::handlers::extract::{AdminUser, Client};
use crate::handlers::views::{AccountView, AuditEventView, PageView, PolicyView};
use crate::state::AppState;
use crate::usecase::admin::{
    AuditLogUseCase, LinkFederationInput, LinkFederationUseCase, ListAccountsUseCase,
    SetAccountDisabledUseCase, UnlinkFederationUseCase,
};
use crate::usecase::policy::{GetPolicyUseCase, UpdatePolicyUseCase};

// ── GET /admin/accounts ──────────────────────────────────────────────────────

pub async fn list_accounts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = ListAccountsUseCase {
        accounts: state.account_repo(),
    };
    let page = usecase.execute(page).await?;
    Ok(Json(PageView::from_page(page, |a| AccountView::from(&a))))
}

// ── POST /admin/accounts/{id}/disable | enable ───────────────────────────────

async fn set_disabled(
    state: AppState,
    admin: AdminUser,
    client: Client,
    id: AccountId,
    disabled: bool,
) -> Result<Json<AccountView>, AuthServiceError> {
    let usecase = SetAccountDisabledUseCase {
        accounts: state.account_repo(),
        sessions: state.session_repo(),
        audit: state.audit_repo(),
    };
    let account = usecase
        .execute(id, disabled, admin.0.account_id, &client.0)
        .await?;
    Ok(Json(AccountView::from(&account)))
}

pub async fn disable_account(
    State(state): State<AppState>,
    admin: AdminUser,
    client: Client,
    Path(id): Path<AccountId>,
) -> Result<impl IntoResponse, AuthServiceError> {
    set_disabled(state, admin, client, id, true).await
}

pub async fn enable_account(
    State(state): State<AppState>,
    admin: AdminUser,
    client: Client,
    Path(id): Path<AccountId>,
) -> Result<impl IntoResponse, AuthServiceError> {
    set_disabled(state, admin, client, id, false).await
}

// ── POST | DELETE /admin/accounts/{id}/federation ────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFederationRequest {
    pub subject_id: String,
    pub tenant_id: String,
}

pub async fn link_federation(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Client(client): Client,
    Path(id): Path<AccountId>,
    Json(body): Json<LinkFederationRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = LinkFederationUseCase {
        accounts: state.account_repo(),
        audit: state.audit_repo(),
    };
    let account = usecase
        .execute(
            id,
            LinkFederationInput {
                subject: body.subject_id,
                tenant: body.tenant_id,
            },
            admin.account_id,
            &client,
        )
        .await?;
    Ok(Json(AccountView::from(&account)))
}

pub async fn unlink_federation(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Client(client): Client,
    Path(id): Path<AccountId>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = UnlinkFederationUseCase {
        accounts: state.account_repo(),
        audit: state.audit_repo(),
    };
    let account = usecase.execute(id, admin.account_id, &client).await?;
    Ok(Json(AccountView::from(&account)))
}

// ── GET | PUT /admin/federation-policy ───────────────────────────────────────

pub async fn get_policy(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = GetPolicyUseCase {
        policies: state.policy_repo(),
    };
    Ok(Json(PolicyView::from(usecase.execute().await?)))
}

/// Fields left out of the request keep the permissive default.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePolicyRequest {
    #[serde(default)]
    pub allowed_tenants: Vec<String>,
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,
    pub default_role_for_sso: Option<Role>,
    pub auto_provision_users: Option<bool>,
    pub federation_only: Option<bool>,
}

pub async fn update_policy(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Client(client): Client,
    Json(body): Json<UpdatePolicyRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let defaults = FederationPolicy::default();
    let policy = FederationPolicy {
        allowed_tenants: body.allowed_tenants,
        allowed_email_domains: body.allowed_email_domains,
        default_role_for_sso: body
            .default_role_for_sso
            .unwrap_or(defaults.default_role_for_sso),
        auto_provision_users: body
            .auto_provision_users
            .unwrap_or(defaults.auto_provision_users),
        federation_only: body.federation_only.unwrap_or(defaults.federation_only),
    };
    let usecase = UpdatePolicyUseCase {
        policies: state.policy_repo(),
        audit: state.audit_repo(),
    };
    let stored = usecase.execute(policy, admin.account_id, &client).await?;
    Ok(Json(PolicyView::from(Some(stored))))
}

// ── GET /admin/audit-events ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditEventsQuery {
    pub account_id: Option<AccountId>,
    pub action: Option<AuditAction>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl AuditEventsQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

pub async fn audit_events(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AuditEventsQuery>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = AuditLogUseCase {
        audit: state.audit_repo(),
    };
    let page = usecase
        .execute(AuditQuery {
            page: query.page_request(),
            account_id: query.account_id,
            action: query.action,
        })
        .await?;
    Ok(Json(PageView::from_page(page, AuditEventView::from)))
}
