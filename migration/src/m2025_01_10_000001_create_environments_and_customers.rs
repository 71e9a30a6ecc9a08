//! Creates the environments and customers tables.

use sea_orm_migration::prelude::*;

use crate::common::{
    base_columns, create_live_unique_index, create_scope_index, drop_index_if_exists, id_column,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut environments = Table::create()
            .table(Environments::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut environments, false);
        environments
            .col(ColumnDef::new(Environments::Name).string().not_null())
            .col(
                ColumnDef::new(Environments::EnvironmentType)
                    .string_len(20)
                    .not_null()
                    .default("development"),
            );
        manager.create_table(environments).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_environments_tenant_id")
                    .table(Environments::Table)
                    .col(Environments::TenantId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let mut customers = Table::create()
            .table(Customers::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut customers, true);
        customers
            .col(ColumnDef::new(Customers::ExternalId).string().not_null())
            .col(ColumnDef::new(Customers::Name).string().not_null())
            .col(ColumnDef::new(Customers::Email).string().null())
            .col(ColumnDef::new(Customers::AddressLine1).string().null())
            .col(ColumnDef::new(Customers::AddressLine2).string().null())
            .col(ColumnDef::new(Customers::AddressCity).string().null())
            .col(ColumnDef::new(Customers::AddressState).string().null())
            .col(ColumnDef::new(Customers::AddressPostalCode).string().null())
            .col(ColumnDef::new(Customers::AddressCountry).string_len(2).null())
            .col(ColumnDef::new(Customers::Metadata).json_binary().null());
        manager.create_table(customers).await?;

        create_scope_index(manager, "customers").await?;
        create_live_unique_index(
            manager,
            "idx_customers_tenant_environment_external_id",
            "customers",
            &["tenant_id", "environment_id", "external_id"],
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_index_if_exists(manager, "idx_customers_tenant_environment_external_id").await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Environments::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Environments {
    Table,
    TenantId,
    Name,
    EnvironmentType,
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    ExternalId,
    Name,
    Email,
    AddressLine1,
    AddressLine2,
    AddressCity,
    AddressState,
    AddressPostalCode,
    AddressCountry,
    Metadata,
}
