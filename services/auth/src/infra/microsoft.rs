use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use crate::config::MicrosoftConfig;
use crate::domain::repository::{IdentityProvider, SigningKeySource};
use crate::domain::types::{FederatedProfile, ProviderTokens, SigningKey};
use crate::error::AuthServiceError;

pub const LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com";

const SCOPES: &str = "openid profile email User.Read";
const PROFILE_FIELDS: &str = "id,mail,userPrincipalName,givenName,surname,displayName";

#[derive(Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct KeySetResponse {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct OrganizationResponse {
    #[serde(default)]
    value: Vec<Organization>,
}

#[derive(Deserialize)]
struct Organization {
    id: Option<String>,
}

/// Microsoft identity platform and Graph client. Every call is bounded by the
/// configured timeout; failures surface as `FederationUnavailable`.
#[derive(Clone)]
pub struct MicrosoftClient {
    http: reqwest::Client,
    config: MicrosoftConfig,
    login_base: String,
    graph_base: String,
}

impl MicrosoftClient {
    pub fn new(config: MicrosoftConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("build identity provider HTTP client")?;
        Ok(Self {
            http,
            config,
            login_base: LOGIN_BASE_URL.to_owned(),
            graph_base: GRAPH_BASE_URL.to_owned(),
        })
    }

    /// Point the client at other hosts, e.g. a local mock server.
    pub fn with_endpoints(mut self, login_base: &str, graph_base: &str) -> Self {
        self.login_base = login_base.trim_end_matches('/').to_owned();
        self.graph_base = graph_base.trim_end_matches('/').to_owned();
        self
    }

    pub fn config(&self) -> &MicrosoftConfig {
        &self.config
    }

    fn tenant_url(&self, tenant: &str, path: &str) -> String {
        format!("{}/{}/{}", self.login_base, tenant, path)
    }
}

fn unavailable(operation: &'static str) -> impl FnOnce(reqwest::Error) -> AuthServiceError {
    move |e| {
        tracing::warn!(
            error = %e,
            timeout = e.is_timeout(),
            status = ?e.status(),
            operation,
            "identity provider request failed"
        );
        AuthServiceError::FederationUnavailable
    }
}

impl IdentityProvider for MicrosoftClient {
    fn authorize_url(&self, state: &str) -> Result<String, AuthServiceError> {
        let url = url::Url::parse_with_params(
            &self.tenant_url(&self.config.tenant_id, "oauth2/v2.0/authorize"),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_mode", "query"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .context("build authorize url")?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthServiceError> {
        let response: TokenResponse = self
            .http
            .post(self.tenant_url(&self.config.tenant_id, "oauth2/v2.0/token"))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("scope", SCOPES),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable("token exchange"))?
            .json()
            .await
            .map_err(unavailable("token exchange"))?;

        match (response.id_token, response.access_token) {
            (Some(id_token), Some(access_token)) => Ok(ProviderTokens {
                id_token,
                access_token,
            }),
            _ => {
                tracing::warn!("token response is missing id_token or access_token");
                Err(AuthServiceError::FederationUnavailable)
            }
        }
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<FederatedProfile, AuthServiceError> {
        self.http
            .get(format!("{}/v1.0/me", self.graph_base))
            .query(&[("$select", PROFILE_FIELDS)])
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable("profile fetch"))?
            .json()
            .await
            .map_err(unavailable("profile fetch"))
    }

    async fn fetch_organization_tenant(
        &self,
        access_token: &str,
    ) -> Result<Option<String>, AuthServiceError> {
        let response: OrganizationResponse = self
            .http
            .get(format!("{}/v1.0/organization", self.graph_base))
            .query(&[("$select", "id")])
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable("organization lookup"))?
            .json()
            .await
            .map_err(unavailable("organization lookup"))?;
        Ok(response.value.into_iter().find_map(|org| org.id))
    }
}

impl SigningKeySource for MicrosoftClient {
    async fn fetch_signing_keys(&self, tenant: &str) -> Result<Vec<SigningKey>, AuthServiceError> {
        let response: KeySetResponse = self
            .http
            .get(self.tenant_url(tenant, "discovery/v2.0/keys"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unavailable("key set fetch"))?
            .json()
            .await
            .map_err(unavailable("key set fetch"))?;

        // Keys without RSA components are skipped rather than failing the whole set.
        Ok(response
            .keys
            .into_iter()
            .filter_map(|key| serde_json::from_value(key).ok())
            .collect())
    }
}
