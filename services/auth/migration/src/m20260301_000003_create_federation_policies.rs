use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FederationPolicies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FederationPolicies::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::AllowedTenants)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::AllowedDomains)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::DefaultRole)
                            .small_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::AutoProvision)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::FederationOnly)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FederationPolicies::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FederationPolicies::UpdatedBy).uuid())
                    // Singleton: the only legal row id is 1.
                    .check(Expr::col(FederationPolicies::Id).eq(1))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FederationPolicies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FederationPolicies {
    Table,
    Id,
    AllowedTenants,
    AllowedDomains,
    DefaultRole,
    AutoProvision,
    FederationOnly,
    UpdatedAt,
    UpdatedBy,
}
