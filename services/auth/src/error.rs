use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Auth service domain error variants.
///
/// Messages are what the caller sees. Unknown-email and wrong-password both surface as
/// `InvalidCredentials`; every federation token or infrastructure fault surfaces as
/// "authentication failed".
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("this account signs in with Microsoft")]
    NoPasswordSet,
    #[error("password sign-in is disabled; sign in with Microsoft")]
    LocalAuthDisabled,
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("password must be at least 8 characters")]
    WeakPassword,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("{0}")]
    InvalidInput(String),
    #[error("this account signs in with Microsoft; password reset is not available")]
    SsoOnlyAccount,
    #[error("reset link is invalid or has expired")]
    InvalidOrExpiredToken,
    #[error("reset link has already been used")]
    TokenAlreadyUsed,
    #[error("sign-in request expired; please try again")]
    InvalidState,
    #[error("Microsoft sign-in is not configured")]
    FederationNotConfigured,
    #[error("authentication failed")]
    FederationUnavailable,
    #[error("authentication failed")]
    InvalidIdToken,
    #[error("authentication failed")]
    ClaimProfileMismatch,
    #[error("Microsoft account has no email address")]
    NoEmailInProfile,
    #[error("your organization is not allowed to sign in")]
    TenantNotAllowed,
    #[error("your email domain is not allowed to sign in")]
    DomainNotAllowed,
    #[error("no account exists for this user; ask an administrator for access")]
    AutoProvisioningDisabled,
    #[error("cannot unlink the only sign-in method; set a password first")]
    CannotUnlinkWithoutPassword,
    #[error("account not found")]
    AccountNotFound,
    #[error("not signed in")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::NoPasswordSet => "NO_PASSWORD_SET",
            Self::LocalAuthDisabled => "LOCAL_AUTH_DISABLED",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::SsoOnlyAccount => "SSO_ONLY_ACCOUNT",
            Self::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            Self::TokenAlreadyUsed => "TOKEN_ALREADY_USED",
            Self::InvalidState => "INVALID_STATE",
            Self::FederationNotConfigured => "FEDERATION_NOT_CONFIGURED",
            Self::FederationUnavailable => "FEDERATION_UNAVAILABLE",
            Self::InvalidIdToken => "INVALID_ID_TOKEN",
            Self::ClaimProfileMismatch => "CLAIM_PROFILE_MISMATCH",
            Self::NoEmailInProfile => "NO_EMAIL_IN_PROFILE",
            Self::TenantNotAllowed => "TENANT_NOT_ALLOWED",
            Self::DomainNotAllowed => "DOMAIN_NOT_ALLOWED",
            Self::AutoProvisioningDisabled => "AUTO_PROVISIONING_DISABLED",
            Self::CannotUnlinkWithoutPassword => "CANNOT_UNLINK_WITHOUT_PASSWORD",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::InvalidIdToken
            | Self::ClaimProfileMismatch
            | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled
            | Self::LocalAuthDisabled
            | Self::TenantNotAllowed
            | Self::DomainNotAllowed
            | Self::AutoProvisioningDisabled
            | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NoPasswordSet
            | Self::WeakPassword
            | Self::InvalidEmail
            | Self::InvalidInput(_)
            | Self::SsoOnlyAccount
            | Self::InvalidOrExpiredToken
            | Self::TokenAlreadyUsed
            | Self::InvalidState
            | Self::NoEmailInProfile => StatusCode::BAD_REQUEST,
            Self::DuplicateEmail | Self::CannotUnlinkWithoutPassword => StatusCode::CONFLICT,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::FederationNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::FederationUnavailable => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code carried on the federation callback's error redirect.
    ///
    /// Token and infrastructure failures collapse into `sso_failed`; policy rejections
    /// stay specific so the login page can explain them.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid_state",
            Self::FederationNotConfigured => "not_configured",
            Self::AccountDisabled => "account_disabled",
            Self::NoEmailInProfile => "no_email",
            Self::TenantNotAllowed => "tenant_not_allowed",
            Self::DomainNotAllowed => "domain_not_allowed",
            Self::AutoProvisioningDisabled => "auto_provisioning_disabled",
            _ => "sso_failed",
        }
    }
}

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // TraceLayer records every request; only 500s need the anyhow chain.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "errorCode": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
