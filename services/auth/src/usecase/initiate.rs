use chrono::Utc;

use crate::domain::repository::{IdentityProvider, PendingStateStore};
use crate::domain::types::PendingState;
use crate::error::AuthServiceError;
use crate::usecase::secret::opaque_token;

/// Starts a federation redirect: stores a fresh state and returns the provider URL.
pub struct InitiateFederationUseCase<'a, T: PendingStateStore, I: IdentityProvider> {
    pub states: T,
    pub provider: Option<&'a I>,
}

impl<T: PendingStateStore, I: IdentityProvider> InitiateFederationUseCase<'_, T, I> {
    pub async fn execute(&self, redirect_to: Option<&str>) -> Result<String, AuthServiceError> {
        let provider = self
            .provider
            .ok_or(AuthServiceError::FederationNotConfigured)?;

        let state = PendingState {
            value: opaque_token(),
            created_at: Utc::now(),
            redirect_to: redirect_to.and_then(sanitize_redirect).map(str::to_owned),
        };
        let url = provider.authorize_url(&state.value)?;
        self.states.insert(&state).await?;
        Ok(url)
    }
}

/// Keeps only same-origin absolute paths.
pub fn sanitize_redirect(target: &str) -> Option<&str> {
    let target = target.trim();
    let same_origin = target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !target.chars().any(char::is_control);
    same_origin.then_some(target)
}
