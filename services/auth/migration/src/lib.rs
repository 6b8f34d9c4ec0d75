pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_accounts;
mod m20260301_000002_create_password_reset_tokens;
mod m20260301_000003_create_federation_policies;
mod m20260301_000004_create_audit_events;
mod m20260301_000005_create_sessions;
mod m20260301_000006_create_crm_profiles;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_accounts::Migration),
            Box::new(m20260301_000002_create_password_reset_tokens::Migration),
            Box::new(m20260301_000003_create_federation_policies::Migration),
            Box::new(m20260301_000004_create_audit_events::Migration),
            Box::new(m20260301_000005_create_sessions::Migration),
            Box::new(m20260301_000006_create_crm_profiles::Migration),
        ]
    }
}
