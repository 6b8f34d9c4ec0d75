use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};

use crate::domain::repository::SigningKeySource;
use crate::domain::types::{ID_TOKEN_LEEWAY_SECS, IdTokenClaims, JWKS_CACHE_TTL, SigningKey};
use crate::error::AuthServiceError;

const ISSUER_V2_PREFIX: &str = "https://login.microsoftonline.com/";
const ISSUER_V2_SUFFIX: &str = "/v2.0";
const ISSUER_V1_PREFIX: &str = "https://sts.windows.net/";
const ISSUER_V1_SUFFIX: &str = "/";

struct CachedKeys {
    keys: Vec<SigningKey>,
    fetched_at: Instant,
}

/// Verifies provider-issued ID tokens against the published key set.
///
/// Keys are cached per tenant for [`JWKS_CACHE_TTL`]. A `kid` missing from a fresh
/// cache triggers one refetch, which covers the provider's key rotation.
pub struct IdTokenVerifier<K: SigningKeySource> {
    source: K,
    client_id: String,
    key_tenant: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedKeys>>,
}

impl<K: SigningKeySource> IdTokenVerifier<K> {
    /// `key_tenant` selects the key-set endpoint, e.g. the configured tenant or `common`.
    pub fn new(source: K, client_id: impl Into<String>, key_tenant: impl Into<String>) -> Self {
        Self {
            source,
            client_id: client_id.into(),
            key_tenant: key_tenant.into(),
            ttl: JWKS_CACHE_TTL,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn verify(&self, token: &str) -> Result<IdTokenClaims, AuthServiceError> {
        let header = decode_header(token).map_err(|e| {
            tracing::warn!(error = %e, "id token header is malformed");
            AuthServiceError::InvalidIdToken
        })?;
        if header.alg != Algorithm::RS256 {
            tracing::warn!(alg = ?header.alg, "id token uses a disallowed algorithm");
            return Err(AuthServiceError::InvalidIdToken);
        }
        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("id token header has no kid");
            AuthServiceError::InvalidIdToken
        })?;

        let key = self.find_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e).map_err(|e| {
            tracing::warn!(error = %e, kid, "published signing key is unusable");
            AuthServiceError::InvalidIdToken
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.validate_nbf = true;
        validation.leeway = ID_TOKEN_LEEWAY_SECS;

        let claims = decode::<IdTokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "id token rejected");
                AuthServiceError::InvalidIdToken
            })?
            .claims;

        if !issuer_matches(&claims.iss, claims.tid.as_deref()) {
            tracing::warn!(iss = %claims.iss, tid = ?claims.tid, "id token issuer does not match tenant");
            return Err(AuthServiceError::InvalidIdToken);
        }

        if let Some(iat) = claims.iat {
            let now = chrono::Utc::now().timestamp();
            if iat > now + ID_TOKEN_LEEWAY_SECS as i64 {
                tracing::warn!(iat, now, "id token issued in the future");
                return Err(AuthServiceError::InvalidIdToken);
            }
        }

        Ok(claims)
    }

    async fn find_key(&self, kid: &str) -> Result<SigningKey, AuthServiceError> {
        if let Some(key) = self.lookup_cached(kid) {
            return Ok(key);
        }

        self.refresh_keys().await?;
        self.lookup_cached(kid).ok_or_else(|| {
            tracing::warn!(kid, tenant = %self.key_tenant, "no published key matches kid");
            AuthServiceError::InvalidIdToken
        })
    }

    fn lookup_cached(&self, kid: &str) -> Option<SigningKey> {
        let cache = self.cache.read().ok()?;
        let cached = cache.get(&self.key_tenant)?;
        if cached.fetched_at.elapsed() > self.ttl {
            return None;
        }
        cached.keys.iter().find(|k| k.kid == kid).cloned()
    }

    async fn refresh_keys(&self) -> Result<(), AuthServiceError> {
        let keys = self.source.fetch_signing_keys(&self.key_tenant).await?;
        let keys = keys
            .into_iter()
            .filter(|k| k.kty.as_deref().is_none_or(|kty| kty == "RSA"))
            .collect::<Vec<_>>();
        tracing::debug!(tenant = %self.key_tenant, count = keys.len(), "refreshed signing keys");

        let mut cache = self
            .cache
            .write()
            .map_err(|_| AuthServiceError::Internal(anyhow::anyhow!("signing key cache poisoned")))?;
        cache.insert(
            self.key_tenant.clone(),
            CachedKeys {
                keys,
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }
}

/// The issuer must be one of the provider's two URL forms for the token's own tenant.
/// Without a tenant claim, either form with any tenant segment is accepted.
fn issuer_matches(iss: &str, tid: Option<&str>) -> bool {
    match tid {
        Some(tid) => {
            iss == format!("{ISSUER_V2_PREFIX}{tid}{ISSUER_V2_SUFFIX}")
                || iss == format!("{ISSUER_V1_PREFIX}{tid}{ISSUER_V1_SUFFIX}")
        }
        None => issuer_tenant(iss).is_some(),
    }
}

fn issuer_tenant(iss: &str) -> Option<&str> {
    let segment = iss
        .strip_prefix(ISSUER_V2_PREFIX)
        .and_then(|rest| rest.strip_suffix(ISSUER_V2_SUFFIX))
        .or_else(|| {
            iss.strip_prefix(ISSUER_V1_PREFIX)
                .and_then(|rest| rest.strip_suffix(ISSUER_V1_SUFFIX))
        })?;
    (!segment.is_empty() && !segment.contains('/')).then_some(segment)
}
