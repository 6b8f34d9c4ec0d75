use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditEvents::AccountId).uuid())
                    .col(ColumnDef::new(AuditEvents::Email).string())
                    .col(ColumnDef::new(AuditEvents::Action).string_len(32).not_null())
                    .col(ColumnDef::new(AuditEvents::Provider).string_len(16).not_null())
                    .col(ColumnDef::new(AuditEvents::Success).boolean().not_null())
                    .col(ColumnDef::new(AuditEvents::FailureReason).string())
                    .col(ColumnDef::new(AuditEvents::Metadata).json_binary())
                    .col(ColumnDef::new(AuditEvents::IpAddress).string())
                    .col(ColumnDef::new(AuditEvents::UserAgent).string())
                    .col(
                        ColumnDef::new(AuditEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Admin log view filters by account and reads newest first.
        manager
            .create_index(
                Index::create()
                    .table(AuditEvents::Table)
                    .col(AuditEvents::AccountId)
                    .col(AuditEvents::CreatedAt)
                    .name("idx_audit_events_account_id_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuditEvents::Table)
                    .col(AuditEvents::CreatedAt)
                    .name("idx_audit_events_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuditEvents {
    Table,
    Id,
    AccountId,
    Email,
    Action,
    Provider,
    Success,
    FailureReason,
    Metadata,
    IpAddress,
    UserAgent,
    CreatedAt,
}
