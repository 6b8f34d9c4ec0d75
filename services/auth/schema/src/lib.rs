//! sea-orm entities for the auth core's tables.

pub mod accounts;
pub mod audit_events;
pub mod crm_profiles;
pub mod federation_policies;
pub mod password_reset_tokens;
pub mod sessions;
