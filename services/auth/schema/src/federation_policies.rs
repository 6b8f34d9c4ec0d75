use sea_orm::entity::prelude::*;

/// Singleton federated-login admission policy (row id is always 1).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "federation_policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// JSON array of tenant ids; empty allows every tenant.
    pub allowed_tenants: Json,
    /// JSON array of lower-case email domains; empty allows every domain.
    pub allowed_domains: Json,
    pub default_role: i16,
    pub auto_provision: bool,
    pub federation_only: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
