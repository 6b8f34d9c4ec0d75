use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};

use dealdesk_auth_schema::{
    accounts, audit_events, crm_profiles, federation_policies, password_reset_tokens, sessions,
};
use dealdesk_domain::account::AccountOrigin;
use dealdesk_domain::id::AccountId;
use dealdesk_domain::pagination::PageRequest;
use dealdesk_domain::role::Role;

use crate::domain::repository::{
    AccountRepository, AuditRepository, PolicyRepository, ProfileDirectory, ResetTokenRepository,
    SessionRepository,
};
use crate::domain::types::{
    Account, AuditEvent, AuditQuery, FederationLink, FederationPolicy, PasswordResetToken, Session,
    StoredPolicy,
};
use crate::error::AuthServiceError;

/// Primary key of the only federation policy row.
const POLICY_ROW_ID: i32 = 1;

fn role_from_column(value: i16) -> anyhow::Result<Role> {
    u8::try_from(value)
        .ok()
        .and_then(Role::from_u8)
        .with_context(|| format!("unknown role value {value}"))
}

// ── Account repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAccountRepository {
    pub db: DatabaseConnection,
}

impl AccountRepository for DbAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthServiceError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find account by email")?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthServiceError> {
        let model = accounts::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find account by id")?;
        Ok(model.map(account_from_model).transpose()?)
    }

    async fn create(&self, account: &Account) -> Result<(), AuthServiceError> {
        let result = account_active_model(account).insert(&self.db).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(AuthServiceError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("create account").into()),
        }
    }

    async fn record_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::LastLoginAt, Expr::value(now))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .context("record account login")?;
        Ok(())
    }

    async fn set_password(
        &self,
        id: AccountId,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthServiceError> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::PasswordHash, Expr::value(hash))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .context("set account password")?;
        Ok(())
    }

    async fn set_disabled(
        &self,
        id: AccountId,
        disabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Disabled, Expr::value(disabled))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .context("set account disabled")?;
        self.reload(id, result.rows_affected).await
    }

    async fn link_federation(
        &self,
        id: AccountId,
        link: &FederationLink,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        let txn = self.db.begin().await.context("begin federation link")?;

        let mut update = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::FederatedSubject,
                Expr::value(link.subject.clone()),
            )
            .col_expr(
                accounts::Column::FederatedTenant,
                Expr::value(link.tenant.clone()),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now));
        if let Some(first) = &link.first_name {
            update = update.col_expr(accounts::Column::FirstName, Expr::value(first.clone()));
        }
        if let Some(last) = &link.last_name {
            update = update.col_expr(accounts::Column::LastName, Expr::value(last.clone()));
        }
        let result = update
            .filter(accounts::Column::Id.eq(id.0))
            .exec(&txn)
            .await
            .context("link federated identity")?;

        // Federated only while the stored row has no password.
        accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Origin,
                Expr::value(AccountOrigin::Federated.as_str()),
            )
            .filter(accounts::Column::Id.eq(id.0))
            .filter(
                Condition::any()
                    .add(accounts::Column::PasswordHash.is_null())
                    .add(accounts::Column::PasswordHash.eq("")),
            )
            .exec(&txn)
            .await
            .context("settle federated origin")?;

        txn.commit().await.context("commit federation link")?;
        self.reload(id, result.rows_affected).await
    }

    async fn unlink_federation(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AuthServiceError> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::FederatedSubject,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                accounts::Column::FederatedTenant,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                accounts::Column::Origin,
                Expr::value(AccountOrigin::Local.as_str()),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .context("unlink federated identity")?;
        self.reload(id, result.rows_affected).await
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<Account>, u64), AuthServiceError> {
        let total = accounts::Entity::find()
            .count(&self.db)
            .await
            .context("count accounts")?;
        let models = accounts::Entity::find()
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .context("list accounts")?;
        let items = models
            .into_iter()
            .map(account_from_model)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((items, total))
    }
}

impl DbAccountRepository {
    async fn reload(
        &self,
        id: AccountId,
        rows_affected: u64,
    ) -> Result<Option<Account>, AuthServiceError> {
        if rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}

fn account_active_model(account: &Account) -> accounts::ActiveModel {
    accounts::ActiveModel {
        id: Set(account.id.0),
        email: Set(account.email.clone()),
        password_hash: Set(account.password_hash.clone()),
        origin: Set(account.origin.as_str().to_owned()),
        federated_subject: Set(account.federated_subject.clone()),
        federated_tenant: Set(account.federated_tenant.clone()),
        first_name: Set(account.first_name.clone()),
        last_name: Set(account.last_name.clone()),
        disabled: Set(account.disabled),
        email_verified: Set(account.email_verified),
        created_at: Set(account.created_at),
        updated_at: Set(account.updated_at),
        last_login_at: Set(account.last_login_at),
    }
}

fn account_from_model(model: accounts::Model) -> anyhow::Result<Account> {
    Ok(Account {
        id: AccountId(model.id),
        email: model.email,
        password_hash: model.password_hash,
        origin: model.origin.parse().context("account origin")?,
        federated_subject: model.federated_subject,
        federated_tenant: model.federated_tenant,
        first_name: model.first_name,
        last_name: model.last_name,
        disabled: model.disabled,
        email_verified: model.email_verified,
        created_at: model.created_at,
        updated_at: model.updated_at,
        last_login_at: model.last_login_at,
    })
}

// ── Reset token repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbResetTokenRepository {
    pub db: DatabaseConnection,
}

impl ResetTokenRepository for DbResetTokenRepository {
    async fn create(&self, token: &PasswordResetToken) -> Result<(), AuthServiceError> {
        password_reset_tokens::ActiveModel {
            token: Set(token.token.clone()),
            account_id: Set(token.account_id.0),
            expires_at: Set(token.expires_at),
            used_at: Set(token.used_at),
            created_at: Set(token.created_at),
        }
        .insert(&self.db)
        .await
        .context("create password reset token")?;
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>, AuthServiceError> {
        let model = password_reset_tokens::Entity::find_by_id(token.to_owned())
            .one(&self.db)
            .await
            .context("find password reset token")?;
        Ok(model.map(|m| PasswordResetToken {
            token: m.token,
            account_id: AccountId(m.account_id),
            expires_at: m.expires_at,
            used_at: m.used_at,
            created_at: m.created_at,
        }))
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<bool, AuthServiceError> {
        let result = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::UsedAt, Expr::value(now))
            .filter(password_reset_tokens::Column::Token.eq(token))
            .filter(password_reset_tokens::Column::UsedAt.is_null())
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .context("consume password reset token")?;
        Ok(result.rows_affected == 1)
    }
}

// ── Policy repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPolicyRepository {
    pub db: DatabaseConnection,
}

impl PolicyRepository for DbPolicyRepository {
    async fn get(&self) -> Result<Option<StoredPolicy>, AuthServiceError> {
        let model = federation_policies::Entity::find_by_id(POLICY_ROW_ID)
            .one(&self.db)
            .await
            .context("load federation policy")?;
        Ok(model.map(policy_from_model).transpose()?)
    }

    async fn put(
        &self,
        policy: &FederationPolicy,
        updated_by: Option<AccountId>,
    ) -> Result<StoredPolicy, AuthServiceError> {
        let now = Utc::now();
        let model = federation_policies::ActiveModel {
            id: Set(POLICY_ROW_ID),
            allowed_tenants: Set(serde_json::to_value(&policy.allowed_tenants)
                .context("encode allowed tenants")?),
            allowed_domains: Set(serde_json::to_value(&policy.allowed_email_domains)
                .context("encode allowed domains")?),
            default_role: Set(i16::from(policy.default_role_for_sso.as_u8())),
            auto_provision: Set(policy.auto_provision_users),
            federation_only: Set(policy.federation_only),
            updated_at: Set(now),
            updated_by: Set(updated_by.map(|id| id.0)),
        };
        federation_policies::Entity::insert(model)
            .on_conflict(
                OnConflict::column(federation_policies::Column::Id)
                    .update_columns([
                        federation_policies::Column::AllowedTenants,
                        federation_policies::Column::AllowedDomains,
                        federation_policies::Column::DefaultRole,
                        federation_policies::Column::AutoProvision,
                        federation_policies::Column::FederationOnly,
                        federation_policies::Column::UpdatedAt,
                        federation_policies::Column::UpdatedBy,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("save federation policy")?;

        Ok(StoredPolicy {
            policy: policy.clone(),
            updated_at: now,
            updated_by,
        })
    }
}

fn policy_from_model(model: federation_policies::Model) -> anyhow::Result<StoredPolicy> {
    Ok(StoredPolicy {
        policy: FederationPolicy {
            allowed_tenants: serde_json::from_value(model.allowed_tenants)
                .context("decode allowed tenants")?,
            allowed_email_domains: serde_json::from_value(model.allowed_domains)
                .context("decode allowed domains")?,
            default_role_for_sso: role_from_column(model.default_role)?,
            auto_provision_users: model.auto_provision,
            federation_only: model.federation_only,
        },
        updated_at: model.updated_at,
        updated_by: model.updated_by.map(AccountId),
    })
}

// ── Audit repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditRepository {
    pub db: DatabaseConnection,
}

impl AuditRepository for DbAuditRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthServiceError> {
        audit_events::ActiveModel {
            id: Set(event.id),
            account_id: Set(event.account_id.map(|id| id.0)),
            email: Set(event.email.clone()),
            action: Set(event.action.as_str().to_owned()),
            provider: Set(event.provider.as_str().to_owned()),
            success: Set(event.success),
            failure_reason: Set(event.failure_reason.clone()),
            metadata: Set(event.metadata.clone()),
            ip_address: Set(event.ip_address.clone()),
            user_agent: Set(event.user_agent.clone()),
            created_at: Set(event.created_at),
        }
        .insert(&self.db)
        .await
        .context("append audit event")?;
        Ok(())
    }

    async fn list(&self, query: &AuditQuery) -> Result<(Vec<AuditEvent>, u64), AuthServiceError> {
        let mut select = audit_events::Entity::find();
        if let Some(account_id) = query.account_id {
            select = select.filter(audit_events::Column::AccountId.eq(account_id.0));
        }
        if let Some(action) = query.action {
            select = select.filter(audit_events::Column::Action.eq(action.as_str()));
        }

        let total = select
            .clone()
            .count(&self.db)
            .await
            .context("count audit events")?;
        let models = select
            .order_by_desc(audit_events::Column::CreatedAt)
            .order_by_desc(audit_events::Column::Id)
            .offset(query.page.offset())
            .limit(query.page.limit())
            .all(&self.db)
            .await
            .context("list audit events")?;
        let items = models
            .into_iter()
            .map(audit_from_model)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((items, total))
    }
}

fn audit_from_model(model: audit_events::Model) -> anyhow::Result<AuditEvent> {
    Ok(AuditEvent {
        id: model.id,
        account_id: model.account_id.map(AccountId),
        email: model.email,
        action: model.action.parse().context("audit action")?,
        provider: model.provider.parse().context("audit provider")?,
        success: model.success,
        failure_reason: model.failure_reason,
        metadata: model.metadata,
        ip_address: model.ip_address,
        user_agent: model.user_agent,
        created_at: model.created_at,
    })
}

// ── Session repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSessionRepository {
    pub db: DatabaseConnection,
}

impl SessionRepository for DbSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), AuthServiceError> {
        sessions::ActiveModel {
            id: Set(session.id.clone()),
            account_id: Set(session.account_id.0),
            email: Set(session.email.clone()),
            display_name: Set(session.display_name.clone()),
            origin: Set(session.origin.as_str().to_owned()),
            disabled: Set(session.disabled),
            created_at: Set(session.created_at),
            expires_at: Set(session.expires_at),
        }
        .insert(&self.db)
        .await
        .context("create session")?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Session>, AuthServiceError> {
        let model = sessions::Entity::find_by_id(id.to_owned())
            .one(&self.db)
            .await
            .context("find session")?;
        let Some(m) = model else {
            return Ok(None);
        };
        Ok(Some(Session {
            id: m.id,
            account_id: AccountId(m.account_id),
            email: m.email,
            display_name: m.display_name,
            origin: m.origin.parse().context("session origin")?,
            disabled: m.disabled,
            created_at: m.created_at,
            expires_at: m.expires_at,
        }))
    }

    async fn delete(&self, id: &str) -> Result<(), AuthServiceError> {
        sessions::Entity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    async fn delete_for_account(&self, account_id: AccountId) -> Result<u64, AuthServiceError> {
        let result = sessions::Entity::delete_many()
            .filter(sessions::Column::AccountId.eq(account_id.0))
            .exec(&self.db)
            .await
            .context("delete sessions for account")?;
        Ok(result.rows_affected)
    }
}

// ── CRM profile directory ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbProfileDirectory {
    pub db: DatabaseConnection,
}

impl ProfileDirectory for DbProfileDirectory {
    async fn find_role(&self, account_id: AccountId) -> Result<Option<Role>, AuthServiceError> {
        let model = crm_profiles::Entity::find_by_id(account_id.0)
            .one(&self.db)
            .await
            .context("find crm profile")?;
        Ok(model.map(|m| role_from_column(m.role)).transpose()?)
    }

    async fn ensure_profile(
        &self,
        account_id: AccountId,
        role: Role,
    ) -> Result<Role, AuthServiceError> {
        crm_profiles::Entity::insert(crm_profiles::ActiveModel {
            account_id: Set(account_id.0),
            role: Set(i16::from(role.as_u8())),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(crm_profiles::Column::AccountId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("ensure crm profile")?;

        self.find_role(account_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("crm profile missing after insert").into())
    }
}
