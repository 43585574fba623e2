use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PushJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PushJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PushJobs::ActionId).string().not_null())
                    .col(ColumnDef::new(PushJobs::AccountId).string().not_null())
                    .col(ColumnDef::new(PushJobs::EntityType).string().not_null())
                    .col(ColumnDef::new(PushJobs::ExternalId).string().not_null())
                    .col(ColumnDef::new(PushJobs::Payload).json().not_null())
                    .col(ColumnDef::new(PushJobs::Status).string().not_null())
                    .col(ColumnDef::new(PushJobs::ErrorMessage).string_len(255).null())
                    .col(
                        ColumnDef::new(PushJobs::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PushJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PushJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PushJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_push_jobs_action_id")
                            .from(PushJobs::Table, PushJobs::ActionId)
                            .to(BulkActions::Table, BulkActions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Completion counts and job logs
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_push_jobs_action_id_status")
                    .table(PushJobs::Table)
                    .col(PushJobs::ActionId)
                    .col(PushJobs::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PushJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PushJobs {
    Table,
    Id,
    ActionId,
    AccountId,
    EntityType,
    ExternalId,
    Payload,
    Status,
    ErrorMessage,
    ProcessedAt,
    Attempts,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BulkActions {
    Table,
    Id,
}
