use chrono::Utc;

use dealdesk_domain::account::AccountOrigin;
use dealdesk_domain::audit::{AuditAction, AuthProvider};
use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;

use crate::domain::repository::{AccountRepository, AuditRepository, SessionRepository};
use crate::domain::types::{Account, AuditEvent, AuditQuery, ClientInfo, FederationLink};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: PageRequest,
}

// ── ListAccounts ─────────────────────────────────────────────────────────────

pub struct ListAccountsUseCase<A: AccountRepository> {
    pub accounts: A,
}

impl<A: AccountRepository> ListAccountsUseCase<A> {
    pub async fn execute(&self, page: PageRequest) -> Result<Page<Account>, AuthServiceError> {
        let page = page.clamped();
        let (items, total) = self.accounts.list(page).await?;
        Ok(Page { items, total, page })
    }
}

// ── SetAccountDisabled ───────────────────────────────────────────────────────

pub struct SetAccountDisabledUseCase<A: AccountRepository, S: SessionRepository, D: AuditRepository>
{
    pub accounts: A,
    pub sessions: S,
    pub audit: D,
}

impl<A: AccountRepository, S: SessionRepository, D: AuditRepository>
    SetAccountDisabledUseCase<A, S, D>
{
    /// Disabling also deletes every session of the account.
    pub async fn execute(
        &self,
        account_id: AccountId,
        disabled: bool,
        actor: AccountId,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let account = self
            .accounts
            .set_disabled(account_id, disabled, Utc::now())
            .await?
            .ok_or(AuthServiceError::AccountNotFound)?;

        if disabled {
            let evicted = self.sessions.delete_for_account(account.id).await?;
            tracing::info!(account_id = %account.id, evicted, "account disabled");
        }

        let action = if disabled {
            AuditAction::AccountDisable
        } else {
            AuditAction::AccountEnable
        };
        record(
            &self.audit,
            AuditEvent::success(action, AuthProvider::Local)
                .account(&account)
                .client(client)
                .metadata(serde_json::json!({ "actor": actor })),
        )
        .await;

        Ok(account)
    }
}

// ── LinkFederation ───────────────────────────────────────────────────────────

pub struct LinkFederationInput {
    pub subject: String,
    pub tenant: String,
}

pub struct LinkFederationUseCase<A: AccountRepository, D: AuditRepository> {
    pub accounts: A,
    pub audit: D,
}

impl<A: AccountRepository, D: AuditRepository> LinkFederationUseCase<A, D> {
    pub async fn execute(
        &self,
        account_id: AccountId,
        input: LinkFederationInput,
        actor: AccountId,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let subject = input.subject.trim();
        let tenant = input.tenant.trim();
        if subject.is_empty() || tenant.is_empty() {
            return Err(AuthServiceError::InvalidInput(
                "subject and tenant are required".to_owned(),
            ));
        }

        let link = FederationLink {
            subject: subject.to_owned(),
            tenant: tenant.to_owned(),
            first_name: None,
            last_name: None,
        };
        let account = self
            .accounts
            .link_federation(account_id, &link, Utc::now())
            .await?
            .ok_or(AuthServiceError::AccountNotFound)?;

        record(
            &self.audit,
            AuditEvent::success(AuditAction::FederationLink, AuthProvider::Microsoft)
                .account(&account)
                .client(client)
                .metadata(serde_json::json!({ "actor": actor, "tenant": tenant })),
        )
        .await;

        Ok(account)
    }
}

// ── UnlinkFederation ─────────────────────────────────────────────────────────

pub struct UnlinkFederationUseCase<A: AccountRepository, D: AuditRepository> {
    pub accounts: A,
    pub audit: D,
}

impl<A: AccountRepository, D: AuditRepository> UnlinkFederationUseCase<A, D> {
    pub async fn execute(
        &self,
        account_id: AccountId,
        actor: AccountId,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::AccountNotFound)?;

        if account.origin == AccountOrigin::Federated && !account.has_password() {
            record(
                &self.audit,
                AuditEvent::failure(
                    AuditAction::FederationUnlink,
                    AuthProvider::Microsoft,
                    "no_password_set",
                )
                .account(&account)
                .client(client)
                .metadata(serde_json::json!({ "actor": actor })),
            )
            .await;
            return Err(AuthServiceError::CannotUnlinkWithoutPassword);
        }

        let account = self
            .accounts
            .unlink_federation(account_id, Utc::now())
            .await?
            .ok_or(AuthServiceError::AccountNotFound)?;

        record(
            &self.audit,
            AuditEvent::success(AuditAction::FederationUnlink, AuthProvider::Microsoft)
                .account(&account)
                .client(client)
                .metadata(serde_json::json!({ "actor": actor })),
        )
        .await;

        Ok(account)
    }
}

// ── AuditLog ─────────────────────────────────────────────────────────────────

pub struct AuditLogUseCase<D: AuditRepository> {
    pub audit: D,
}

impl<D: AuditRepository> AuditLogUseCase<D> {
    pub async fn execute(&self, query: AuditQuery) -> Result<Page<AuditEvent>, AuthServiceError> {
        let query = AuditQuery {
            page: query.page.clamped(),
            ..query
        };
        let (items, total) = self.audit.list(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
        })
    }
}
