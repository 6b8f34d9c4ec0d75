//! Audit trail vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happened. Stored and serialized as snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Register,
    Login,
    Logout,
    SsoLogin,
    SsoProvision,
    PasswordResetRequest,
    PasswordResetComplete,
    FederationLink,
    FederationUnlink,
    AccountEnable,
    AccountDisable,
    PolicyUpdate,
}

impl AuditAction {
    pub const ALL: [AuditAction; 12] = [
        Self::Register,
        Self::Login,
        Self::Logout,
        Self::SsoLogin,
        Self::SsoProvision,
        Self::PasswordResetRequest,
        Self::PasswordResetComplete,
        Self::FederationLink,
        Self::FederationUnlink,
        Self::AccountEnable,
        Self::AccountDisable,
        Self::PolicyUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::SsoLogin => "sso_login",
            Self::SsoProvision => "sso_provision",
            Self::PasswordResetRequest => "password_reset_request",
            Self::PasswordResetComplete => "password_reset_complete",
            Self::FederationLink => "federation_link",
            Self::FederationUnlink => "federation_unlink",
            Self::AccountEnable => "account_enable",
            Self::AccountDisable => "account_disable",
            Self::PolicyUpdate => "policy_update",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or queried audit vocabulary value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audit value: {0}")]
pub struct UnknownAuditValue(pub String);

impl FromStr for AuditAction {
    type Err = UnknownAuditValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAuditValue(s.to_owned()))
    }
}

/// Which authentication provider an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Local,
    Microsoft,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Microsoft => "microsoft",
        }
    }
}

impl FromStr for AuthProvider {
    type Err = UnknownAuditValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "microsoft" => Ok(Self::Microsoft),
            _ => Err(UnknownAuditValue(s.to_owned())),
        }
    }
}
