use dealdesk_domain::audit::{AuditAction, AuthProvider};
use dealdesk_domain::id::AccountId;

use crate::domain::repository::{AuditRepository, PolicyRepository};
use crate::domain::types::{AuditEvent, ClientInfo, FederationPolicy, StoredPolicy};
use crate::error::AuthServiceError;
use crate::usecase::audit::record;

/// Effective policy: the stored one, or permissive defaults when none was saved.
pub async fn load_policy<P: PolicyRepository>(
    policies: &P,
) -> Result<FederationPolicy, AuthServiceError> {
    Ok(policies
        .get()
        .await?
        .map(|stored| stored.policy)
        .unwrap_or_default())
}

// ── GetPolicy ────────────────────────────────────────────────────────────────

pub struct GetPolicyUseCase<P: PolicyRepository> {
    pub policies: P,
}

impl<P: PolicyRepository> GetPolicyUseCase<P> {
    /// `None` in the result means defaults are in effect.
    pub async fn execute(&self) -> Result<Option<StoredPolicy>, AuthServiceError> {
        self.policies.get().await
    }
}

// ── UpdatePolicy ─────────────────────────────────────────────────────────────

pub struct UpdatePolicyUseCase<P: PolicyRepository, D: AuditRepository> {
    pub policies: P,
    pub audit: D,
}

impl<P: PolicyRepository, D: AuditRepository> UpdatePolicyUseCase<P, D> {
    pub async fn execute(
        &self,
        policy: FederationPolicy,
        actor: AccountId,
        client: &ClientInfo,
    ) -> Result<StoredPolicy, AuthServiceError> {
        let policy = policy.normalized();
        let stored = self.policies.put(&policy, Some(actor)).await?;

        tracing::info!(
            tenants = policy.allowed_tenants.len(),
            domains = policy.allowed_email_domains.len(),
            auto_provision = policy.auto_provision_users,
            federation_only = policy.federation_only,
            "federation policy updated"
        );
        record(
            &self.audit,
            AuditEvent::success(AuditAction::PolicyUpdate, AuthProvider::Local)
                .account_id(actor)
                .client(client)
                .metadata(serde_json::json!({
                    "allowedTenants": policy.allowed_tenants,
                    "allowedEmailDomains": policy.allowed_email_domains,
                    "defaultRoleForSso": policy.default_role_for_sso,
                    "autoProvisionUsers": policy.auto_provision_users,
                    "federationOnly": policy.federation_only,
                })),
        )
        .await;

        Ok(stored)
    }
}
