use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::domain::repository::PendingStateStore;
use crate::domain::types::PendingState;
use crate::error::AuthServiceError;
use crate::infra::cache::RedisStateStore;

/// Expired entries are swept once every this many inserts.
const SWEEP_EVERY: u64 = 100;

/// Upper bound on live pending states held by one process.
pub const MAX_PENDING_STATES: usize = 10_000;

/// Process-local pending states. Not shared between instances.
#[derive(Clone)]
pub struct MemoryStateStore {
    states: Arc<DashMap<String, PendingState>>,
    inserts: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_STATES)
    }
}

impl MemoryStateStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Arc::default(),
            inserts: Arc::default(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn sweep(&self) {
        let now = Utc::now();
        self.states.retain(|_, s| !s.is_expired(now));
    }
}

impl PendingStateStore for MemoryStateStore {
    async fn insert(&self, state: &PendingState) -> Result<(), AuthServiceError> {
        if self.states.len() >= self.capacity {
            self.sweep();
            if self.states.len() >= self.capacity {
                tracing::warn!(
                    capacity = self.capacity,
                    "pending state store full, refusing federation login"
                );
                return Err(AuthServiceError::FederationUnavailable);
            }
        }

        self.states.insert(state.value.clone(), state.clone());

        let count = self.inserts.fetch_add(1, Ordering::Relaxed);
        if count % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        Ok(())
    }

    async fn take(&self, value: &str) -> Result<Option<PendingState>, AuthServiceError> {
        Ok(self.states.remove(value).map(|(_, state)| state))
    }
}

/// Backend selected at startup: Redis when `REDIS_URL` is set, else memory.
#[derive(Clone)]
pub enum PendingStates {
    Memory(MemoryStateStore),
    Redis(RedisStateStore),
}

impl PendingStateStore for PendingStates {
    async fn insert(&self, state: &PendingState) -> Result<(), AuthServiceError> {
        match self {
            Self::Memory(store) => store.insert(state).await,
            Self::Redis(store) => store.insert(state).await,
        }
    }

    async fn take(&self, value: &str) -> Result<Option<PendingState>, AuthServiceError> {
        match self {
            Self::Memory(store) => store.take(value).await,
            Self::Redis(store) => store.take(value).await,
        }
    }
}
