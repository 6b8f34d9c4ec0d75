use anyhow::Context as _;
use deadpool_redis::Pool;
use deadpool_redis::redis::AsyncCommands;

use crate::domain::repository::PendingStateStore;
use crate::domain::types::{PENDING_STATE_TTL_SECS, PendingState};
use crate::error::AuthServiceError;

/// Pending federation states in Redis, shared by every instance.
#[derive(Clone)]
pub struct RedisStateStore {
    pub pool: Pool,
}

fn state_key(value: &str) -> String {
    format!("federation_state:{value}")
}

impl PendingStateStore for RedisStateStore {
    async fn insert(&self, state: &PendingState) -> Result<(), AuthServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        let payload = serde_json::to_string(state).context("encode pending state")?;
        let (): () = conn
            .set_ex(state_key(&state.value), payload, PENDING_STATE_TTL_SECS as u64)
            .await
            .map_err(|e: deadpool_redis::redis::RedisError| AuthServiceError::Internal(e.into()))?;
        Ok(())
    }

    async fn take(&self, value: &str) -> Result<Option<PendingState>, AuthServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        let payload: Option<String> = conn
            .get_del(state_key(value))
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        payload
            .map(|p| serde_json::from_str(&p).context("decode pending state"))
            .transpose()
            .map_err(AuthServiceError::from)
    }
}
