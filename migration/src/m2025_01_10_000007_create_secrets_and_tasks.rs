//! Creates API key secrets and import/export tasks.

use sea_orm_migration::prelude::*;

use crate::common::{base_columns, create_scope_index, id_column};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut secrets = Table::create()
            .table(Secrets::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut secrets, true);
        secrets
            .col(ColumnDef::new(Secrets::Name).string().not_null())
            .col(ColumnDef::new(Secrets::SecretType).string_len(30).not_null())
            .col(ColumnDef::new(Secrets::Provider).string_len(30).not_null())
            .col(ColumnDef::new(Secrets::Value).string_len(128).not_null())
            .col(ColumnDef::new(Secrets::DisplayId).string_len(20).not_null())
            .col(ColumnDef::new(Secrets::Permissions).json_binary().not_null())
            .col(ColumnDef::new(Secrets::ExpiresAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Secrets::LastUsedAt).timestamp_with_time_zone().null());
        manager.create_table(secrets).await?;
        create_scope_index(manager, "secrets").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_secrets_value")
                    .table(Secrets::Table)
                    .col(Secrets::Value)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let mut tasks = Table::create()
            .table(Tasks::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut tasks, true);
        tasks
            .col(ColumnDef::new(Tasks::TaskType).string_len(20).not_null())
            .col(ColumnDef::new(Tasks::EntityType).string_len(20).not_null())
            .col(ColumnDef::new(Tasks::FileUrl).text().not_null())
            .col(ColumnDef::new(Tasks::FileName).string().null())
            .col(ColumnDef::new(Tasks::FileType).string_len(10).not_null())
            .col(
                ColumnDef::new(Tasks::TaskStatus)
                    .string_len(20)
                    .not_null()
                    .default("PENDING"),
            )
            .col(ColumnDef::new(Tasks::TotalRecords).integer().null())
            .col(
                ColumnDef::new(Tasks::ProcessedRecords)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(Tasks::SuccessfulRecords)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(Tasks::FailedRecords)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(Tasks::ErrorSummary).text().null())
            .col(ColumnDef::new(Tasks::Metadata).json_binary().null())
            .col(ColumnDef::new(Tasks::StartedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Tasks::CompletedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Tasks::FailedAt).timestamp_with_time_zone().null());
        manager.create_table(tasks).await?;
        create_scope_index(manager, "tasks").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Secrets::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Secrets {
    Table,
    Name,
    SecretType,
    Provider,
    Value,
    DisplayId,
    Permissions,
    ExpiresAt,
    LastUsedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    TaskType,
    EntityType,
    FileUrl,
    FileName,
    FileType,
    TaskStatus,
    TotalRecords,
    ProcessedRecords,
    SuccessfulRecords,
    FailedRecords,
    ErrorSummary,
    Metadata,
    StartedAt,
    CompletedAt,
    FailedAt,
}
