//! Creates the product catalog: meters, features, plans, prices, entitlements
//! and credit grants.

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
        let mut meters = Table::create()
            .table(Meters::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut meters, true);
        meters
            .col(ColumnDef::new(Meters::EventName).string().not_null())
            .col(ColumnDef::new(Meters::Name).string().not_null())
            .col(ColumnDef::new(Meters::Aggregation).json_binary().not_null())
            .col(ColumnDef::new(Meters::Filters).json_binary().null())
            .col(
                ColumnDef::new(Meters::ResetUsage)
                    .string_len(20)
                    .not_null()
                    .default("BILLING_PERIOD"),
            );
        manager.create_table(meters).await?;
        create_scope_index(manager, "meters").await?;

        let mut features = Table::create()
            .table(Features::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut features, true);
        features
            .col(ColumnDef::new(Features::LookupKey).string().not_null())
            .col(ColumnDef::new(Features::Name).string().not_null())
            .col(ColumnDef::new(Features::Description).text().null())
            .col(ColumnDef::new(Features::FeatureType).string_len(20).not_null())
            .col(ColumnDef::new(Features::MeterId).string_len(50).null())
            .col(ColumnDef::new(Features::UnitSingular).string().null())
            .col(ColumnDef::new(Features::UnitPlural).string().null())
            .col(ColumnDef::new(Features::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_features_meter_id")
                    .from(Features::Table, Features::MeterId)
                    .to(Meters::Table, Meters::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            );
        manager.create_table(features).await?;
        create_scope_index(manager, "features").await?;
        create_live_unique_index(
            manager,
            "idx_features_tenant_environment_lookup_key",
            "features",
            &["tenant_id", "environment_id", "lookup_key"],
        )
        .await?;

        let mut plans = Table::create()
            .table(Plans::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut plans, true);
        plans
            .col(ColumnDef::new(Plans::LookupKey).string().null())
            .col(ColumnDef::new(Plans::Name).string().not_null())
            .col(ColumnDef::new(Plans::Description).text().null())
            .col(ColumnDef::new(Plans::Metadata).json_binary().null());
        manager.create_table(plans).await?;
        create_scope_index(manager, "plans").await?;
        create_live_unique_index(
            manager,
            "idx_plans_tenant_environment_lookup_key",
            "plans",
            &["tenant_id", "environment_id", "lookup_key"],
        )
        .await?;

        let mut prices = Table::create()
            .table(Prices::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut prices, true);
        prices
            .col(ColumnDef::new(Prices::PlanId).string_len(50).not_null())
            .col(money_column(backend, Prices::Amount))
            .col(ColumnDef::new(Prices::DisplayAmount).string().not_null())
            .col(ColumnDef::new(Prices::Currency).string_len(3).not_null())
            .col(ColumnDef::new(Prices::PriceType).string_len(20).not_null())
            .col(ColumnDef::new(Prices::BillingPeriod).string_len(20).not_null())
            .col(
                ColumnDef::new(Prices::BillingPeriodCount)
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(ColumnDef::new(Prices::BillingModel).string_len(20).not_null())
            .col(ColumnDef::new(Prices::BillingCadence).string_len(20).not_null())
            .col(
                ColumnDef::new(Prices::InvoiceCadence)
                    .string_len(20)
                    .not_null()
                    .default("ARREAR"),
            )
            .col(ColumnDef::new(Prices::MeterId).string_len(50).null())
            .col(ColumnDef::new(Prices::TierMode).string_len(20).null())
            .col(ColumnDef::new(Prices::Tiers).json_binary().null())
            .col(ColumnDef::new(Prices::TransformQuantity).json_binary().null())
            .col(ColumnDef::new(Prices::LookupKey).string().null())
            .col(ColumnDef::new(Prices::Description).text().null())
            .col(ColumnDef::new(Prices::Metadata).json_binary().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_prices_plan_id")
                    .from(Prices::Table, Prices::PlanId)
                    .to(Plans::Table, Plans::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_prices_meter_id")
                    .from(Prices::Table, Prices::MeterId)
                    .to(Meters::Table, Meters::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            );
        manager.create_table(prices).await?;
        create_scope_index(manager, "prices").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_plan_id")
                    .table(Prices::Table)
                    .col(Prices::PlanId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        create_live_unique_index(
            manager,
            "idx_prices_tenant_environment_lookup_key",
            "prices",
            &["tenant_id", "environment_id", "lookup_key"],
        )
        .await?;

        let mut entitlements = Table::create()
            .table(Entitlements::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut entitlements, true);
        entitlements
            .col(ColumnDef::new(Entitlements::PlanId).string_len(50).not_null())
            .col(ColumnDef::new(Entitlements::FeatureId).string_len(50).not_null())
            .col(ColumnDef::new(Entitlements::FeatureType).string_len(20).not_null())
            .col(
                ColumnDef::new(Entitlements::IsEnabled)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Entitlements::UsageLimit).big_integer().null())
            .col(ColumnDef::new(Entitlements::UsageResetPeriod).string_len(20).null())
            .col(
                ColumnDef::new(Entitlements::IsSoftLimit)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Entitlements::StaticValue).string().null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_entitlements_plan_id")
                    .from(Entitlements::Table, Entitlements::PlanId)
                    .to(Plans::Table, Plans::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_entitlements_feature_id")
                    .from(Entitlements::Table, Entitlements::FeatureId)
                    .to(Features::Table, Features::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(entitlements).await?;
        create_scope_index(manager, "entitlements").await?;
        create_live_unique_index(
            manager,
            "idx_entitlements_plan_feature",
            "entitlements",
            &["tenant_id", "environment_id", "plan_id", "feature_id"],
        )
        .await?;

        let mut credit_grants = Table::create()
            .table(CreditGrants::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut credit_grants, true);
        credit_grants
            .col(ColumnDef::new(CreditGrants::Name).string().not_null())
            .col(ColumnDef::new(CreditGrants::GrantScope).string_len(20).not_null())
            .col(ColumnDef::new(CreditGrants::PlanId).string_len(50).null())
            .col(ColumnDef::new(CreditGrants::SubscriptionId).string_len(50).null())
            .col(money_column(backend, CreditGrants::Credits))
            .col(ColumnDef::new(CreditGrants::Currency).string_len(3).not_null())
            .col(ColumnDef::new(CreditGrants::Cadence).string_len(20).not_null())
            .col(ColumnDef::new(CreditGrants::ExpirationDays).integer().null())
            .col(ColumnDef::new(CreditGrants::Priority).integer().null())
            .col(ColumnDef::new(CreditGrants::Metadata).json_binary().null());
        manager.create_table(credit_grants).await?;
        create_scope_index(manager, "credit_grants").await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_entitlements_plan_feature",
            "idx_prices_tenant_environment_lookup_key",
            "idx_plans_tenant_environment_lookup_key",
            "idx_features_tenant_environment_lookup_key",
        ] {
            drop_index_if_exists(manager, index).await?;
        }

        manager
            .drop_table(Table::drop().table(CreditGrants::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Entitlements::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Features::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Meters::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Meters {
    Table,
    Id,
    EventName,
    Name,
    Aggregation,
    Filters,
    ResetUsage,
}

#[derive(DeriveIden)]
enum Features {
    Table,
    Id,
    LookupKey,
    Name,
    Description,
    FeatureType,
    MeterId,
    UnitSingular,
    UnitPlural,
    Metadata,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    LookupKey,
    Name,
    Description,
    Metadata,
}

#[derive(DeriveIden)]
enum Prices {
    Table,
    PlanId,
    Amount,
    DisplayAmount,
    Currency,
    PriceType,
    BillingPeriod,
    BillingPeriodCount,
    BillingModel,
    BillingCadence,
    InvoiceCadence,
    MeterId,
    TierMode,
    Tiers,
    TransformQuantity,
    LookupKey,
    Description,
    Metadata,
}

#[derive(DeriveIden)]
enum Entitlements {
    Table,
    PlanId,
    FeatureId,
    FeatureType,
    IsEnabled,
    UsageLimit,
    UsageResetPeriod,
    IsSoftLimit,
    StaticValue,
}

#[derive(DeriveIden)]
enum CreditGrants {
    Table,
    Name,
    GrantScope,
    PlanId,
    SubscriptionId,
    Credits,
    Currency,
    Cadence,
    ExpirationDays,
    Priority,
    Metadata,
}
