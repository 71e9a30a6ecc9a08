//! Creates payments and payment attempts.

use sea_orm_migration::prelude::*;

use crate::common::{
    base_columns, create_live_unique_index, create_scope_index, drop_index_if_exists, id_column,
    money_column,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let mut payments = Table::create()
            .table(Payments::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut payments, true);
        payments
            .col(ColumnDef::new(Payments::IdempotencyKey).string_len(100).not_null())
            .col(ColumnDef::new(Payments::DestinationType).string_len(20).not_null())
            .col(ColumnDef::new(Payments::DestinationId).string_len(50).not_null())
            .col(ColumnDef::new(Payments::PaymentMethodType).string_len(20).not_null())
            .col(ColumnDef::new(Payments::PaymentMethodId).string_len(100).null())
            .col(money_column(backend, Payments::Amount))
            .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
            .col(
                ColumnDef::new(Payments::PaymentStatus)
                    .string_len(20)
                    .not_null()
                    .default("PENDING"),
            )
            .col(
                ColumnDef::new(Payments::TrackAttempts)
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .col(ColumnDef::new(Payments::SucceededAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Payments::FailedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Payments::ErrorMessage).text().null())
            .col(ColumnDef::new(Payments::Metadata).json_binary().null());
        manager.create_table(payments).await?;
        create_scope_index(manager, "payments").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_payments_destination")
                    .table(Payments::Table)
                    .col(Payments::DestinationType)
                    .col(Payments::DestinationId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        create_live_unique_index(
            manager,
            "idx_payments_tenant_environment_idempotency_key",
            "payments",
            &["tenant_id", "environment_id", "idempotency_key"],
        )
        .await?;

        let mut attempts = Table::create()
            .table(PaymentAttempts::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut attempts, true);
        attempts
            .col(ColumnDef::new(PaymentAttempts::PaymentId).string_len(50).not_null())
            .col(ColumnDef::new(PaymentAttempts::AttemptNumber).integer().not_null())
            .col(
                ColumnDef::new(PaymentAttempts::PaymentStatus)
                    .string_len(20)
                    .not_null(),
            )
            .col(ColumnDef::new(PaymentAttempts::GatewayAttemptId).string().null())
            .col(ColumnDef::new(PaymentAttempts::ErrorMessage).text().null())
            .col(ColumnDef::new(PaymentAttempts::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_payment_attempts_payment_id")
                    .from(PaymentAttempts::Table, PaymentAttempts::PaymentId)
                    .to(Payments::Table, Payments::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(attempts).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_payment_attempts_payment_attempt")
                    .table(PaymentAttempts::Table)
                    .col(PaymentAttempts::PaymentId)
                    .col(PaymentAttempts::AttemptNumber)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_index_if_exists(manager, "idx_payments_tenant_environment_idempotency_key").await?;
        manager
            .drop_table(Table::drop().table(PaymentAttempts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    IdempotencyKey,
    DestinationType,
    DestinationId,
    PaymentMethodType,
    PaymentMethodId,
    Amount,
    Currency,
    PaymentStatus,
    TrackAttempts,
    SucceededAt,
    FailedAt,
    ErrorMessage,
    Metadata,
}

#[derive(DeriveIden)]
enum PaymentAttempts {
    Table,
    PaymentId,
    AttemptNumber,
    PaymentStatus,
    GatewayAttemptId,
    ErrorMessage,
    Metadata,
}
