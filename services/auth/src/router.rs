use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use dealdesk_core::health::{healthz, readiness};
use dealdesk_core::middleware::{propagate_request_id_layer, request_id_layer, trace_layer};

use crate::handlers::{
    admin::{
        audit_events, disable_account, enable_account, get_policy, link_federation,
        list_accounts, unlink_federation, update_policy,
    },
    federation, local,
    reset::{forgot_password, reset_password},
};
use crate::state::AppState;

async fn readyz(State(state): State<AppState>) -> StatusCode {
    let ready = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            false
        }
    };
    readiness(ready)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Local accounts
        .route("/auth/register", post(local::register))
        .route("/auth/login", post(local::login))
        .route("/auth/logout", post(local::logout))
        .route("/auth/me", get(local::me))
        // Password reset
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
        // Microsoft federation
        .route("/auth/microsoft/status", get(federation::status))
        .route("/auth/microsoft/login", get(federation::login))
        .route("/auth/microsoft/callback", get(federation::callback))
        // Administration
        .route("/admin/accounts", get(list_accounts))
        .route("/admin/accounts/{id}/disable", post(disable_account))
        .route("/admin/accounts/{id}/enable", post(enable_account))
        .route(
            "/admin/accounts/{id}/federation",
            post(link_federation).delete(unlink_federation),
        )
        .route(
            "/admin/federation-policy",
            get(get_policy).put(update_policy),
        )
        .route("/admin/audit-events", get(audit_events))
        .layer(trace_layer())
        .layer(propagate_request_id_layer())
        .layer(request_id_layer())
        .with_state(state)
}
