use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::Key;

use dealdesk_auth_types::cookie::SESSION_COOKIE;
use dealdesk_auth_types::identity::CurrentUser;

use crate::domain::types::ClientInfo;
use crate::error::AuthServiceError;
use crate::state::AppState;
use crate::usecase::session::Requirement;

const USER_AGENT_MAX_LEN: usize = 512;

/// Session id from the signed session cookie; `None` when absent or tampered.
pub fn session_id(headers: &HeaderMap, key: &Key) -> Option<String> {
    SignedCookieJar::from_headers(headers, key.clone())
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
}

/// Caller passing the `isAuthenticated` gate.
pub struct AuthUser(pub CurrentUser);

/// Caller passing the `isAdmin` gate.
pub struct AdminUser(pub CurrentUser);

fn authorize(
    parts: &Parts,
    state: &AppState,
    requirement: Requirement,
) -> impl Future<Output = Result<CurrentUser, AuthServiceError>> + Send + 'static {
    let session_id = session_id(&parts.headers, &state.cookie_key);
    let usecase = state.authorize_usecase();
    async move { usecase.execute(session_id.as_deref(), requirement).await }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthServiceError;

    // Extract synchronously and return a 'static future; see axum-core's
    // `fn -> impl Future + Send` signature.
    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let fut = authorize(parts, state, Requirement::Authenticated);
        async move { fut.await.map(Self) }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthServiceError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let fut = authorize(parts, state, Requirement::Admin);
        async move { fut.await.map(Self) }
    }
}

/// Caller address and agent for audit events.
pub struct Client(pub ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let info = client_info(&parts.headers);
        async move { Ok(Self(info)) }
    }
}

pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let ip_address = header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header("x-real-ip"))
        .map(str::to_owned);
    let user_agent = header("user-agent").map(|ua| ua.chars().take(USER_AGENT_MAX_LEN).collect());
    ClientInfo {
        ip_address,
        user_agent,
    }
}
