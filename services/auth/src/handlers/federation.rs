use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::SignedCookieJar;
use serde::{Deserialize, Serialize};

use crate::domain::repository::PendingStateStore;
use crate::error::AuthServiceError;
use crate::handlers::extract::Client;
use crate::handlers::local::{authenticate, start_session};
use crate::state::AppState;
use crate::usecase::authenticate::AuthMethod;
use crate::usecase::initiate::InitiateFederationUseCase;

// ── GET /auth/microsoft/status ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub configured: bool,
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        configured: state.microsoft.is_some(),
    })
}

// ── GET /auth/microsoft/login ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AuthServiceError> {
    let usecase = InitiateFederationUseCase {
        states: state.states.clone(),
        provider: state.microsoft.as_ref().map(|m| &m.client),
    };
    let url = usecase.execute(query.redirect.as_deref()).await?;
    Ok(Redirect::to(&url))
}

// ── GET /auth/microsoft/callback ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user cancelled or consent failed.
    pub error: Option<String>,
}

/// Always redirects: to the captured target on success, to the login page with an
/// error code otherwise.
pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Client(client): Client,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let base = state.config.app_base_url.clone();

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(provider_error = error, "identity provider returned an error");
        if let Some(value) = query.state.as_deref() {
            discard_state(&state, value).await;
        }
        return error_redirect(&base, "sso_failed");
    }

    let Some(state_value) = query.state else {
        return error_redirect(&base, AuthServiceError::InvalidState.redirect_code());
    };
    let Some(code) = query.code else {
        discard_state(&state, &state_value).await;
        return error_redirect(&base, AuthServiceError::InvalidState.redirect_code());
    };

    let method = AuthMethod::Federated {
        code,
        state: state_value,
    };
    let result = match authenticate(&state, method, &client).await {
        Ok(authenticated) => start_session(&state, jar, &authenticated.account)
            .await
            .map(|jar| (jar, authenticated.redirect_to)),
        Err(e) => Err(e),
    };

    match result {
        Ok((jar, redirect_to)) => {
            let target = format!("{base}{}", redirect_to.as_deref().unwrap_or("/"));
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            if let AuthServiceError::Internal(ref inner) = e {
                tracing::error!(error = %format!("{inner:#}"), "federation callback failed");
            }
            error_redirect(&base, e.redirect_code())
        }
    }
}

/// Drops a pending state that arrived with an unusable callback so it cannot be replayed.
async fn discard_state(state: &AppState, value: &str) {
    if let Err(e) = state.states.take(value).await {
        tracing::warn!(error = ?e, "failed to discard pending state");
    }
}

fn error_redirect(base: &str, code: &str) -> Response {
    Redirect::to(&format!("{base}/login?error={code}")).into_response()
}
