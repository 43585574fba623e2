use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BulkActions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BulkActions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BulkActions::AccountId).string().not_null())
                    .col(ColumnDef::new(BulkActions::ActionType).string().not_null())
                    .col(ColumnDef::new(BulkActions::EntityType).string().not_null())
                    .col(ColumnDef::new(BulkActions::Status).string().not_null())
                    .col(ColumnDef::new(BulkActions::OriginalFileName).string().null())
                    .col(ColumnDef::new(BulkActions::FilePath).string().null())
                    .col(
                        ColumnDef::new(BulkActions::TotalEntities)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::ProcessedEntities)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::SuccessCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::FailedCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::SkippedCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::RejectedRows)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkActions::ScheduledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BulkActions::ProcessingStartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BulkActions::ProcessingCompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BulkActions::IngestedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(BulkActions::ErrorMessage).text().null())
                    .col(ColumnDef::new(BulkActions::CreatedBy).string().null())
                    .col(
                        ColumnDef::new(BulkActions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BulkActions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bulk_actions_account_id")
                    .table(BulkActions::Table)
                    .col(BulkActions::AccountId)
                    .to_owned(),
            )
            .await?;

        // Scheduler sweep
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bulk_actions_status_scheduled_at")
                    .table(BulkActions::Table)
                    .col(BulkActions::Status)
                    .col(BulkActions::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BulkActions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BulkActions {
    Table,
    Id,
    AccountId,
    ActionType,
    EntityType,
    Status,
    OriginalFileName,
    FilePath,
    TotalEntities,
    ProcessedEntities,
    SuccessCount,
    FailedCount,
    SkippedCount,
    RejectedRows,
    ScheduledAt,
    ProcessingStartedAt,
    ProcessingCompletedAt,
    IngestedAt,
    ErrorMessage,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
