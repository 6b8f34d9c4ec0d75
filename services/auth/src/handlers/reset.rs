use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::error::AuthServiceError;
use crate::handlers::extract::Client;
use crate::state::AppState;
use crate::usecase::reset::{
    RequestResetOutput, RequestResetUseCase, ResetPasswordInput, ResetPasswordUseCase,
};

// ── POST /auth/password/forgot ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
    /// Development only. Absent in production regardless of outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

/// Same body for matched and unmatched emails; the token is only echoed outside production.
pub fn forgot_password_response(
    output: RequestResetOutput,
    environment: Environment,
) -> ForgotPasswordResponse {
    let reset_token = if environment.is_production() {
        None
    } else {
        output.token.map(|t| t.token)
    };
    ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE,
        reset_token,
    }
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = RequestResetUseCase {
        accounts: state.account_repo(),
        tokens: state.reset_token_repo(),
        policies: state.policy_repo(),
        audit: state.audit_repo(),
    };
    let output = usecase.execute(&body.email, &client).await?;
    if output.token.is_some() {
        // Delivery is external; the link is {APP_BASE_URL}/reset-password?token=...
        tracing::info!("password reset token issued");
    }
    Ok(Json(forgot_password_response(
        output,
        state.config.environment,
    )))
}

// ── POST /auth/password/reset ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = ResetPasswordUseCase {
        accounts: state.account_repo(),
        tokens: state.reset_token_repo(),
        sessions: state.session_repo(),
        audit: state.audit_repo(),
        hasher: state.hasher,
    };
    usecase
        .execute(
            ResetPasswordInput {
                token: body.token,
                new_password: body.new_password,
            },
            &client,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
