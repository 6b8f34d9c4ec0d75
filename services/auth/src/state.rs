use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sea_orm::DatabaseConnection;

use dealdesk_auth_types::cookie::CookieSettings;

use crate::config::AuthConfig;
use crate::infra::db::{
    DbAccountRepository, DbAuditRepository, DbPolicyRepository, DbProfileDirectory,
    DbResetTokenRepository, DbSessionRepository,
};
use crate::infra::microsoft::MicrosoftClient;
use crate::infra::state_store::PendingStates;
use crate::usecase::authenticate::Federation;
use crate::usecase::id_token::IdTokenVerifier;
use crate::usecase::password::PasswordHasher;
use crate::usecase::session::AuthorizeUseCase;

/// Configured Microsoft federation: the HTTP client and the verifier owning the key cache.
#[derive(Clone)]
pub struct MicrosoftFederation {
    pub client: MicrosoftClient,
    pub verifier: Arc<IdTokenVerifier<MicrosoftClient>>,
}

impl MicrosoftFederation {
    pub fn new(client: MicrosoftClient) -> Self {
        let config = client.config();
        let verifier = IdTokenVerifier::new(
            client.clone(),
            config.client_id.clone(),
            config.tenant_id.clone(),
        );
        Self {
            client,
            verifier: Arc::new(verifier),
        }
    }
}

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AuthConfig>,
    pub cookie_key: Key,
    pub states: PendingStates,
    pub microsoft: Option<MicrosoftFederation>,
    pub hasher: PasswordHasher,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn account_repo(&self) -> DbAccountRepository {
        DbAccountRepository {
            db: self.db.clone(),
        }
    }

    pub fn reset_token_repo(&self) -> DbResetTokenRepository {
        DbResetTokenRepository {
            db: self.db.clone(),
        }
    }

    pub fn policy_repo(&self) -> DbPolicyRepository {
        DbPolicyRepository {
            db: self.db.clone(),
        }
    }

    pub fn audit_repo(&self) -> DbAuditRepository {
        DbAuditRepository {
            db: self.db.clone(),
        }
    }

    pub fn session_repo(&self) -> DbSessionRepository {
        DbSessionRepository {
            db: self.db.clone(),
        }
    }

    pub fn profile_directory(&self) -> DbProfileDirectory {
        DbProfileDirectory {
            db: self.db.clone(),
        }
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            domain: self.config.cookie_domain.clone(),
            secure: self.config.environment.is_production(),
        }
    }

    pub fn federation(&self) -> Option<Federation<MicrosoftClient, MicrosoftClient>> {
        let microsoft = self.microsoft.as_ref()?;
        Some(Federation {
            provider: microsoft.client.clone(),
            verifier: Arc::clone(&microsoft.verifier),
            default_tenant: microsoft
                .client
                .config()
                .concrete_tenant()
                .map(str::to_owned),
        })
    }

    pub fn authorize_usecase(
        &self,
    ) -> AuthorizeUseCase<DbSessionRepository, DbAccountRepository, DbProfileDirectory, DbPolicyRepository>
    {
        AuthorizeUseCase {
            sessions: self.session_repo(),
            accounts: self.account_repo(),
            profiles: self.profile_directory(),
            policies: self.policy_repo(),
        }
    }
}
