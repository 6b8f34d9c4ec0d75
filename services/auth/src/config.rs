use std::time::Duration;

use anyhow::{Context as _, bail};

/// Deployment environment. Gates operator conveniences that must never reach production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" | "staging" => Ok(Self::Development),
            other => bail!("APP_ENV: unknown environment {other:?}"),
        }
    }
}

/// Microsoft identity platform registration. Present only when both client id and
/// secret are configured.
#[derive(Debug, Clone)]
pub struct MicrosoftConfig {
    /// Application (client) id; the required `aud` of every ID token.
    pub client_id: String,
    pub client_secret: String,
    /// Directory tenant, or a multi-tenant alias such as `common`. Env var: `MICROSOFT_TENANT_ID`.
    pub tenant_id: String,
    /// Absolute URL the provider redirects back to.
    pub redirect_uri: String,
}

/// Tenant values that select a class of tenants rather than naming one.
const MULTI_TENANT_ALIASES: [&str; 3] = ["common", "organizations", "consumers"];

impl MicrosoftConfig {
    /// The configured tenant when it names a concrete directory.
    pub fn concrete_tenant(&self) -> Option<&str> {
        let tenant = self.tenant_id.as_str();
        (!MULTI_TENANT_ALIASES.contains(&tenant.to_ascii_lowercase().as_str())).then_some(tenant)
    }
}

/// Auth service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Optional Redis URL; when set, pending federation states are kept in Redis.
    pub redis_url: Option<String>,
    /// Key material for the signed session cookie (at least 64 bytes).
    pub session_secret: String,
    /// Public base URL of the CRM (e.g. "https://crm.example.com"), no trailing slash.
    pub app_base_url: String,
    /// Cookie domain attribute; host-only when unset.
    pub cookie_domain: Option<String>,
    /// TCP port to listen on (default 3112). Env var: `AUTH_PORT`.
    pub auth_port: u16,
    pub environment: Environment,
    /// Timeout for every outbound identity-provider call (default 10s).
    pub http_timeout: Duration,
    pub microsoft: Option<MicrosoftConfig>,
}

/// Minimum `SESSION_SECRET` length accepted by the cookie signing key.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| get(name).with_context(|| format!("{name} is not set"));

        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }

        let app_base_url = required("APP_BASE_URL")?.trim_end_matches('/').to_owned();
        url::Url::parse(&app_base_url).context("APP_BASE_URL is not a valid URL")?;

        let environment = match get("APP_ENV") {
            Some(v) => Environment::parse(&v)?,
            None => Environment::Development,
        };

        let auth_port = match get("AUTH_PORT") {
            Some(v) => v.parse().context("AUTH_PORT must be a port number")?,
            None => 3112,
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => Duration::from_secs(10),
        };
        if http_timeout.is_zero() {
            bail!("HTTP_TIMEOUT_SECS must be greater than zero");
        }

        let microsoft = match (get("MICROSOFT_CLIENT_ID"), get("MICROSOFT_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(MicrosoftConfig {
                client_id,
                client_secret,
                tenant_id: get("MICROSOFT_TENANT_ID").unwrap_or_else(|| "common".to_owned()),
                redirect_uri: format!("{app_base_url}/auth/microsoft/callback"),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: get("REDIS_URL"),
            session_secret,
            app_base_url,
            cookie_domain: get("COOKIE_DOMAIN"),
            auth_port,
            environment,
            http_timeout,
            microsoft,
        })
    }
}
