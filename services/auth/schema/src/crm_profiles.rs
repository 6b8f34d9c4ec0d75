use sea_orm::entity::prelude::*;

/// Role-bearing CRM profile, keyed 1:1 by account id.
/// Owned by the surrounding CRM; the auth core only reads the role and bootstraps rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "crm_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: Uuid,
    /// 0 = sales, 1 = manager, 2 = admin.
    pub role: i16,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
