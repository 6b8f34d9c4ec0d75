use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;

use dealdesk_auth_types::cookie::{SESSION_COOKIE, cleared_session_cookie, session_cookie};

use crate::domain::types::{Account, ClientInfo};
use crate::error::AuthServiceError;
use crate::handlers::extract::{AuthUser, Client};
use crate::handlers::views::AccountView;
use crate::infra::microsoft::MicrosoftClient;
use crate::state::AppState;
use crate::usecase::authenticate::{AuthMethod, AuthenticateUseCase, Authenticated};
use crate::usecase::password::{RegisterInput, RegisterUseCase};
use crate::usecase::session::{IssueSessionUseCase, LogoutUseCase};

/// Issue a session for `account` and add its cookie to the jar.
pub(crate) async fn start_session(
    state: &AppState,
    jar: SignedCookieJar,
    account: &Account,
) -> Result<SignedCookieJar, AuthServiceError> {
    let session = IssueSessionUseCase {
        sessions: state.session_repo(),
    }
    .execute(account)
    .await?;
    Ok(jar.add(session_cookie(session.id, &state.cookie_settings())))
}

/// Unified authenticate use case wired to the database and the configured provider.
pub(crate) async fn authenticate(
    state: &AppState,
    method: AuthMethod,
    client: &ClientInfo,
) -> Result<Authenticated, AuthServiceError> {
    AuthenticateUseCase::<_, _, _, _, _, _, MicrosoftClient, MicrosoftClient> {
        accounts: state.account_repo(),
        policies: state.policy_repo(),
        profiles: state.profile_directory(),
        sessions: state.session_repo(),
        states: state.states.clone(),
        audit: state.audit_repo(),
        hasher: state.hasher,
        federation: state.federation(),
    }
    .execute(method, client)
    .await
}

// ── POST /auth/register ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Client(client): Client,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = RegisterUseCase {
        accounts: state.account_repo(),
        policies: state.policy_repo(),
        audit: state.audit_repo(),
        hasher: state.hasher,
    };
    let account = usecase
        .execute(
            RegisterInput {
                email: body.email,
                password: body.password,
                first_name: body.first_name,
                last_name: body.last_name,
            },
            &client,
        )
        .await?;

    let jar = start_session(&state, jar, &account).await?;
    Ok((jar, (StatusCode::CREATED, Json(AccountView::from(&account)))))
}

// ── POST /auth/login ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Client(client): Client,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let method = AuthMethod::Local {
        email: body.email,
        password: body.password,
    };
    let authenticated = authenticate(&state, method, &client).await?;

    let jar = start_session(&state, jar, &authenticated.account).await?;
    Ok((jar, Json(AccountView::from(&authenticated.account))))
}

// ── POST /auth/logout ────────────────────────────────────────────────────────

pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Client(client): Client,
) -> Result<impl IntoResponse, AuthServiceError> {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());
    let usecase = LogoutUseCase {
        sessions: state.session_repo(),
        audit: state.audit_repo(),
    };
    usecase.execute(session_id.as_deref(), &client).await?;

    let jar = jar.add(cleared_session_cookie(&state.cookie_settings()));
    Ok((jar, StatusCode::NO_CONTENT))
}

// ── GET /auth/me ─────────────────────────────────────────────────────────────

pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(user)
}
