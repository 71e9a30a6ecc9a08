//! Creates subscriptions, their line items, and subscription schedules with
//! their phases.

use sea_orm_migration::prelude::*;

use crate::common::{
    base_columns, create_live_unique_index, create_scope_index, decimal_column,
    drop_index_if_exists, id_column,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let mut subscriptions = Table::create()
            .table(Subscriptions::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut subscriptions, true);
        subscriptions
            .col(ColumnDef::new(Subscriptions::LookupKey).string().null())
            .col(ColumnDef::new(Subscriptions::CustomerId).string_len(50).not_null())
            .col(ColumnDef::new(Subscriptions::PlanId).string_len(50).not_null())
            .col(
                ColumnDef::new(Subscriptions::SubscriptionStatus)
                    .string_len(30)
                    .not_null()
                    .default("active"),
            )
            .col(ColumnDef::new(Subscriptions::Currency).string_len(3).not_null())
            .col(
                ColumnDef::new(Subscriptions::BillingAnchor)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Subscriptions::StartDate)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Subscriptions::EndDate).timestamp_with_time_zone().null())
            .col(
                ColumnDef::new(Subscriptions::CurrentPeriodStart)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Subscriptions::CurrentPeriodEnd)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Subscriptions::CancelledAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Subscriptions::CancelAt).timestamp_with_time_zone().null())
            .col(
                ColumnDef::new(Subscriptions::CancelAtPeriodEnd)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Subscriptions::TrialStart).timestamp_with_time_zone().null())
            .col(ColumnDef::new(Subscriptions::TrialEnd).timestamp_with_time_zone().null())
            .col(
                ColumnDef::new(Subscriptions::BillingCadence)
                    .string_len(20)
                    .not_null(),
            )
            .col(ColumnDef::new(Subscriptions::BillingPeriod).string_len(20).not_null())
            .col(
                ColumnDef::new(Subscriptions::BillingPeriodCount)
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(
                ColumnDef::new(Subscriptions::Version)
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(ColumnDef::new(Subscriptions::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_subscriptions_customer_id")
                    .from(Subscriptions::Table, Subscriptions::CustomerId)
                    .to(Customers::Table, Customers::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_subscriptions_plan_id")
                    .from(Subscriptions::Table, Subscriptions::PlanId)
                    .to(Plans::Table, Plans::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            );
        manager.create_table(subscriptions).await?;
        create_scope_index(manager, "subscriptions").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_customer_id")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        create_live_unique_index(
            manager,
            "idx_subscriptions_tenant_environment_lookup_key",
            "subscriptions",
            &["tenant_id", "environment_id", "lookup_key"],
        )
        .await?;

        let mut line_items = Table::create()
            .table(SubscriptionLineItems::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut line_items, true);
        line_items
            .col(
                ColumnDef::new(SubscriptionLineItems::SubscriptionId)
                    .string_len(50)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::CustomerId)
                    .string_len(50)
                    .not_null(),
            )
            .col(ColumnDef::new(SubscriptionLineItems::PlanId).string_len(50).null())
            .col(ColumnDef::new(SubscriptionLineItems::PlanDisplayName).string().null())
            .col(
                ColumnDef::new(SubscriptionLineItems::PriceId)
                    .string_len(50)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::PriceType)
                    .string_len(20)
                    .not_null(),
            )
            .col(ColumnDef::new(SubscriptionLineItems::MeterId).string_len(50).null())
            .col(ColumnDef::new(SubscriptionLineItems::MeterDisplayName).string().null())
            .col(ColumnDef::new(SubscriptionLineItems::DisplayName).string().null())
            .col(
                decimal_column(backend, SubscriptionLineItems::Quantity)
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::Currency)
                    .string_len(3)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::BillingPeriod)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::InvoiceCadence)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::StartDate)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(
                ColumnDef::new(SubscriptionLineItems::EndDate)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(SubscriptionLineItems::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_subscription_line_items_subscription_id")
                    .from(
                        SubscriptionLineItems::Table,
                        SubscriptionLineItems::SubscriptionId,
                    )
                    .to(Subscriptions::Table, Subscriptions::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(line_items).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_line_items_subscription_id")
                    .table(SubscriptionLineItems::Table)
                    .col(SubscriptionLineItems::SubscriptionId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let mut schedules = Table::create()
            .table(SubscriptionSchedules::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut schedules, true);
        schedules
            .col(
                ColumnDef::new(SubscriptionSchedules::SubscriptionId)
                    .string_len(50)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionSchedules::ScheduleStatus)
                    .string_len(20)
                    .not_null()
                    .default("ACTIVE"),
            )
            .col(
                ColumnDef::new(SubscriptionSchedules::CurrentPhaseIndex)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(
                ColumnDef::new(SubscriptionSchedules::EndBehavior)
                    .string_len(20)
                    .not_null()
                    .default("RELEASE"),
            )
            .col(
                ColumnDef::new(SubscriptionSchedules::StartDate)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(SubscriptionSchedules::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_subscription_schedules_subscription_id")
                    .from(
                        SubscriptionSchedules::Table,
                        SubscriptionSchedules::SubscriptionId,
                    )
                    .to(Subscriptions::Table, Subscriptions::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(schedules).await?;
        create_scope_index(manager, "subscription_schedules").await?;

        let mut phases = Table::create()
            .table(SubscriptionSchedulePhases::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut phases, true);
        phases
            .col(
                ColumnDef::new(SubscriptionSchedulePhases::ScheduleId)
                    .string_len(50)
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionSchedulePhases::PhaseIndex)
                    .integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionSchedulePhases::StartDate)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(SubscriptionSchedulePhases::EndDate)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(
                decimal_column(backend, SubscriptionSchedulePhases::CommitmentAmount)
                    .null(),
            )
            .col(
                decimal_column(backend, SubscriptionSchedulePhases::OverageFactor)
                    .null(),
            )
            .col(ColumnDef::new(SubscriptionSchedulePhases::LineItems).json_binary().null())
            .col(
                ColumnDef::new(SubscriptionSchedulePhases::CreditGrants)
                    .json_binary()
                    .null(),
            )
            .col(ColumnDef::new(SubscriptionSchedulePhases::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_subscription_schedule_phases_schedule_id")
                    .from(
                        SubscriptionSchedulePhases::Table,
                        SubscriptionSchedulePhases::ScheduleId,
                    )
                    .to(SubscriptionSchedules::Table, SubscriptionSchedules::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(phases).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_schedule_phases_schedule_phase")
                    .table(SubscriptionSchedulePhases::Table)
                    .col(SubscriptionSchedulePhases::ScheduleId)
                    .col(SubscriptionSchedulePhases::PhaseIndex)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_index_if_exists(manager, "idx_subscriptions_tenant_environment_lookup_key").await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SubscriptionSchedulePhases::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SubscriptionSchedules::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(SubscriptionLineItems::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    Id,
    LookupKey,
    CustomerId,
    PlanId,
    SubscriptionStatus,
    Currency,
    BillingAnchor,
    StartDate,
    EndDate,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    CancelledAt,
    CancelAt,
    CancelAtPeriodEnd,
    TrialStart,
    TrialEnd,
    BillingCadence,
    BillingPeriod,
    BillingPeriodCount,
    Version,
    Metadata,
}

#[derive(DeriveIden)]
enum SubscriptionLineItems {
    Table,
    SubscriptionId,
    CustomerId,
    PlanId,
    PlanDisplayName,
    PriceId,
    PriceType,
    MeterId,
    MeterDisplayName,
    DisplayName,
    Quantity,
    Currency,
    BillingPeriod,
    InvoiceCadence,
    StartDate,
    EndDate,
    Metadata,
}

#[derive(DeriveIden)]
enum SubscriptionSchedules {
    Table,
    Id,
    SubscriptionId,
    ScheduleStatus,
    CurrentPhaseIndex,
    EndBehavior,
    StartDate,
    Metadata,
}

#[derive(DeriveIden)]
enum SubscriptionSchedulePhases {
    Table,
    ScheduleId,
    PhaseIndex,
    StartDate,
    EndDate,
    CommitmentAmount,
    OverageFactor,
    LineItems,
    CreditGrants,
    Metadata,
}
