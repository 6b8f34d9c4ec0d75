use chrono::Utc;

use dealdesk_domain::account::normalize_email;
use dealdesk_domain::audit::{AuditAction, AuthProvider};

use crate::domain::repository::{
    AccountRepository, AuditRepository, PolicyRepository, ProfileDirectory, SessionRepository,
};
use crate::domain::types::{
    Account, AuditEvent, ClientInfo, FederatedProfile, FederationLink, non_blank,
};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;
use crate::usecase::policy::load_policy;

/// A verified federated identity ready for admission.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub profile: FederatedProfile,
    /// Stable external subject id.
    pub subject: String,
    /// Tenant after resolution; `unknown` when nothing else was available.
    pub tenant: String,
}

/// Admits a federated identity under the current policy and binds it to an account,
/// provisioning one when allowed.
pub struct BindFederatedIdentityUseCase<
    A: AccountRepository,
    P: PolicyRepository,
    R: ProfileDirectory,
    S: SessionRepository,
    D: AuditRepository,
> {
    pub accounts: A,
    pub policies: P,
    pub profiles: R,
    pub sessions: S,
    pub audit: D,
}

impl<
    A: AccountRepository,
    P: PolicyRepository,
    R: ProfileDirectory,
    S: SessionRepository,
    D: AuditRepository,
> BindFederatedIdentityUseCase<A, P, R, S, D>
{
    pub async fn execute(
        &self,
        identity: &FederatedIdentity,
        client: &ClientInfo,
    ) -> Result<Account, AuthServiceError> {
        let Some(email) = identity.profile.email().map(normalize_email) else {
            self.reject(None, "no_email_in_profile", identity, client)
                .await;
            return Err(AuthServiceError::NoEmailInProfile);
        };

        let policy = load_policy(&self.policies).await?;

        if !policy.permits_tenant(&identity.tenant) {
            self.reject(Some(&email), "tenant_not_allowed", identity, client)
                .await;
            return Err(AuthServiceError::TenantNotAllowed);
        }
        if !policy.permits_email(&email) {
            self.reject(Some(&email), "domain_not_allowed", identity, client)
                .await;
            return Err(AuthServiceError::DomainNotAllowed);
        }

        let now = Utc::now();
        match self.accounts.find_by_email(&email).await? {
            Some(account) if account.disabled => {
                self.sessions.delete_for_account(account.id).await?;
                self.reject(Some(&email), "account_disabled", identity, client)
                    .await;
                Err(AuthServiceError::AccountDisabled)
            }
            Some(existing) => {
                let link = FederationLink {
                    subject: identity.subject.clone(),
                    tenant: identity.tenant.clone(),
                    first_name: non_blank(identity.profile.given_name.as_deref())
                        .map(str::to_owned),
                    last_name: non_blank(identity.profile.surname.as_deref()).map(str::to_owned),
                };
                let mut account = self
                    .accounts
                    .link_federation(existing.id, &link, now)
                    .await?
                    .ok_or(AuthServiceError::AccountNotFound)?;
                self.accounts.record_login(account.id, now).await?;
                account.last_login_at = Some(now);

                record(
                    &self.audit,
                    AuditEvent::success(AuditAction::SsoLogin, AuthProvider::Microsoft)
                        .account(&account)
                        .client(client)
                        .metadata(serde_json::json!({ "tenant": identity.tenant })),
                )
                .await;
                Ok(account)
            }
            None if !policy.auto_provision_users => {
                self.reject(Some(&email), "auto_provisioning_disabled", identity, client)
                    .await;
                Err(AuthServiceError::AutoProvisioningDisabled)
            }
            None => {
                let account = Account::new_federated(
                    email,
                    identity.subject.clone(),
                    identity.tenant.clone(),
                    non_blank(identity.profile.given_name.as_deref()).map(str::to_owned),
                    non_blank(identity.profile.surname.as_deref()).map(str::to_owned),
                    now,
                );
                self.accounts.create(&account).await?;
                let role = self
                    .profiles
                    .ensure_profile(account.id, policy.default_role_for_sso)
                    .await?;

                tracing::info!(account_id = %account.id, tenant = %identity.tenant, %role, "provisioned federated account");
                record(
                    &self.audit,
                    AuditEvent::success(AuditAction::SsoProvision, AuthProvider::Microsoft)
                        .account(&account)
                        .client(client)
                        .metadata(serde_json::json!({
                            "tenant": identity.tenant,
                            "role": role,
                        })),
                )
                .await;
                Ok(account)
            }
        }
    }

    async fn reject(
        &self,
        email: Option<&str>,
        reason: &str,
        identity: &FederatedIdentity,
        client: &ClientInfo,
    ) {
        let mut event = AuditEvent::failure(AuditAction::SsoLogin, AuthProvider::Microsoft, reason)
            .client(client)
            .metadata(serde_json::json!({ "tenant": identity.tenant }));
        if let Some(email) = email {
            event = event.email(email);
        }
        record(&self.audit, event).await;
    }
}
