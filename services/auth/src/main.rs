use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use sea_orm::Database;
use tracing::info;

use dealdesk_auth::config::AuthConfig;
use dealdesk_auth::infra::cache::RedisStateStore;
use dealdesk_auth::infra::microsoft::MicrosoftClient;
use dealdesk_auth::infra::state_store::{MemoryStateStore, PendingStates};
use dealdesk_auth::router::build_router;
use dealdesk_auth::state::{AppState, MicrosoftFederation};
use dealdesk_auth::usecase::password::PasswordHasher;

#[tokio::main]
async fn main() {
    dealdesk_core::tracing::init_tracing();

    let config = AuthConfig::from_env().expect("invalid configuration");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let states = match &config.redis_url {
        Some(url) => {
            let pool = deadpool_redis::Config::from_url(url)
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .expect("failed to create Redis pool");
            info!("pending federation states stored in Redis");
            PendingStates::Redis(RedisStateStore { pool })
        }
        None => PendingStates::Memory(MemoryStateStore::default()),
    };

    let microsoft = config.microsoft.clone().map(|ms| {
        let client = MicrosoftClient::new(ms, config.http_timeout)
            .expect("failed to build identity provider client");
        MicrosoftFederation::new(client)
    });
    if microsoft.is_none() {
        info!("Microsoft federation not configured");
    }

    let state = AppState {
        db,
        cookie_key: Key::from(config.session_secret.as_bytes()),
        states,
        microsoft,
        hasher: PasswordHasher::default(),
        config: Arc::new(config),
    };

    let addr = format!("0.0.0.0:{}", state.config.auth_port);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("auth service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
