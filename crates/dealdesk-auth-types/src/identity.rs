//! The identity the auth core hands to every protected CRM operation.

use serde::{Deserialize, Serialize};

use dealdesk_domain::id::AccountId;
use dealdesk_domain::role::Role;

/// Caller identity resolved from the session store on every request.
///
/// Built fresh per request from the authoritative account row and CRM profile, so it is
/// never stale with respect to role or disabled state at gate time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub account_id: AccountId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub disabled: bool,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
