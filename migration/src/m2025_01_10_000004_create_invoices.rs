//! Creates invoices, invoice line items and the two counter tables used for
//! invoice numbering and per-subscription billing sequences.

use sea_orm_migration::prelude::*;

use crate::common::{
    base_columns, create_live_unique_index, create_partial_unique_index, create_scope_index,
    decimal_column, drop_index_if_exists, id_column, money_column,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let mut invoices = Table::create()
            .table(Invoices::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut invoices, true);
        invoices
            .col(ColumnDef::new(Invoices::CustomerId).string_len(50).not_null())
            .col(ColumnDef::new(Invoices::SubscriptionId).string_len(50).null())
            .col(ColumnDef::new(Invoices::InvoiceType).string_len(20).not_null())
            .col(
                ColumnDef::new(Invoices::InvoiceStatus)
                    .string_len(20)
                    .not_null()
                    .default("DRAFT"),
            )
            .col(
                ColumnDef::new(Invoices::PaymentStatus)
                    .string_len(20)
                    .not_null()
                    .default("PENDING"),
            )
            .col(ColumnDef::new(Invoices::Currency).string_len(3).not_null())
            .col(money_column(backend, Invoices::AmountDue))
            .col(money_column(backend, Invoices::AmountPaid))
            .col(money_column(backend, Invoices::AmountRemaining))
            .col(ColumnDef::new(Invoices::Description).text().null())
            .col(ColumnDef::new(Invoices::DueDate).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::PaidAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::VoidedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::FinalizedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::BillingPeriod).string_len(20).null())
            .col(ColumnDef::new(Invoices::PeriodStart).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::PeriodEnd).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Invoices::InvoicePdfUrl).text().null())
            .col(ColumnDef::new(Invoices::BillingReason).string_len(30).null())
            .col(ColumnDef::new(Invoices::Metadata).json_binary().null())
            .col(
                ColumnDef::new(Invoices::Version)
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(ColumnDef::new(Invoices::InvoiceNumber).string_len(50).null())
            .col(ColumnDef::new(Invoices::BillingSequence).integer().null())
            .col(ColumnDef::new(Invoices::IdempotencyKey).string_len(100).null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_invoices_customer_id")
                    .from(Invoices::Table, Invoices::CustomerId)
                    .to(Customers::Table, Customers::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            );
        manager.create_table(invoices).await?;
        create_scope_index(manager, "invoices").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_customer_id")
                    .table(Invoices::Table)
                    .col(Invoices::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_invoices_subscription_period")
                    .table(Invoices::Table)
                    .col(Invoices::SubscriptionId)
                    .col(Invoices::PeriodStart)
                    .col(Invoices::PeriodEnd)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        create_live_unique_index(
            manager,
            "idx_invoices_tenant_environment_number",
            "invoices",
            &["tenant_id", "environment_id", "invoice_number"],
        )
        .await?;
        // A voided invoice releases its key so the period can be billed again.
        create_partial_unique_index(
            manager,
            "idx_invoices_tenant_environment_idempotency_key",
            "invoices",
            &["tenant_id", "environment_id", "idempotency_key"],
            "status = 'published' AND invoice_status <> 'VOIDED'",
        )
        .await?;

        let mut line_items = Table::create()
            .table(InvoiceLineItems::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut line_items, true);
        line_items
            .col(ColumnDef::new(InvoiceLineItems::InvoiceId).string_len(50).not_null())
            .col(ColumnDef::new(InvoiceLineItems::CustomerId).string_len(50).not_null())
            .col(ColumnDef::new(InvoiceLineItems::SubscriptionId).string_len(50).null())
            .col(ColumnDef::new(InvoiceLineItems::PlanId).string_len(50).null())
            .col(ColumnDef::new(InvoiceLineItems::PlanDisplayName).string().null())
            .col(ColumnDef::new(InvoiceLineItems::PriceId).string_len(50).null())
            .col(ColumnDef::new(InvoiceLineItems::PriceType).string_len(20).null())
            .col(ColumnDef::new(InvoiceLineItems::MeterId).string_len(50).null())
            .col(ColumnDef::new(InvoiceLineItems::MeterDisplayName).string().null())
            .col(ColumnDef::new(InvoiceLineItems::DisplayName).string().null())
            .col(money_column(backend, InvoiceLineItems::Amount))
            .col(
                decimal_column(backend, InvoiceLineItems::Quantity)
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(InvoiceLineItems::Currency).string_len(3).not_null())
            .col(
                ColumnDef::new(InvoiceLineItems::PeriodStart)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(
                ColumnDef::new(InvoiceLineItems::PeriodEnd)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(InvoiceLineItems::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_invoice_line_items_invoice_id")
                    .from(InvoiceLineItems::Table, InvoiceLineItems::InvoiceId)
                    .to(Invoices::Table, Invoices::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(line_items).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_invoice_line_items_invoice_id")
                    .table(InvoiceLineItems::Table)
                    .col(InvoiceLineItems::InvoiceId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceSequences::TenantId)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::EnvironmentId)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::YearMonth)
                            .string_len(6)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::LastValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(InvoiceSequences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_invoice_sequences")
                            .col(InvoiceSequences::TenantId)
                            .col(InvoiceSequences::EnvironmentId)
                            .col(InvoiceSequences::YearMonth),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BillingSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillingSequences::TenantId)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingSequences::SubscriptionId)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingSequences::LastSequence)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BillingSequences::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BillingSequences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_billing_sequences")
                            .col(BillingSequences::TenantId)
                            .col(BillingSequences::SubscriptionId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_index_if_exists(manager, "idx_invoices_tenant_environment_idempotency_key").await?;
        drop_index_if_exists(manager, "idx_invoices_tenant_environment_number").await?;
        manager
            .drop_table(Table::drop().table(BillingSequences::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceSequences::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceLineItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    CustomerId,
    SubscriptionId,
    InvoiceType,
    InvoiceStatus,
    PaymentStatus,
    Currency,
    AmountDue,
    AmountPaid,
    AmountRemaining,
    Description,
    DueDate,
    PaidAt,
    VoidedAt,
    FinalizedAt,
    BillingPeriod,
    PeriodStart,
    PeriodEnd,
    InvoicePdfUrl,
    BillingReason,
    Metadata,
    Version,
    InvoiceNumber,
    BillingSequence,
    IdempotencyKey,
}

#[derive(DeriveIden)]
enum InvoiceLineItems {
    Table,
    InvoiceId,
    CustomerId,
    SubscriptionId,
    PlanId,
    PlanDisplayName,
    PriceId,
    PriceType,
    MeterId,
    MeterDisplayName,
    DisplayName,
    Amount,
    Quantity,
    Currency,
    PeriodStart,
    PeriodEnd,
    Metadata,
}

#[derive(DeriveIden)]
enum InvoiceSequences {
    Table,
    TenantId,
    EnvironmentId,
    YearMonth,
    LastValue,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BillingSequences {
    Table,
    TenantId,
    SubscriptionId,
    LastSequence,
    CreatedAt,
    UpdatedAt,
}
