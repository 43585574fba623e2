use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contacts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contacts::ExternalId).string().not_null())
                    .col(ColumnDef::new(Contacts::AccountId).string().not_null())
                    .col(ColumnDef::new(Contacts::Name).string().null())
                    .col(ColumnDef::new(Contacts::Email).string().null())
                    .col(ColumnDef::new(Contacts::Status).string().null())
                    .col(ColumnDef::new(Contacts::Age).integer().null())
                    .col(ColumnDef::new(Contacts::City).string().null())
                    .col(ColumnDef::new(Contacts::Attributes).json().null())
                    .col(ColumnDef::new(Contacts::LastActionId).string().null())
                    .col(
                        ColumnDef::new(Contacts::LastActionAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Contacts::UpdatedAt)
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
                    .name("idx_contacts_external_id_account_id")
                    .table(Contacts::Table)
                    .col(Contacts::ExternalId)
                    .col(Contacts::AccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contacts_email_account_id")
                    .table(Contacts::Table)
                    .col(Contacts::Email)
                    .col(Contacts::AccountId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Contacts {
    Table,
    Id,
    ExternalId,
    AccountId,
    Name,
    Email,
    Status,
    Age,
    City,
    Attributes,
    LastActionId,
    LastActionAt,
    CreatedAt,
    UpdatedAt,
}
