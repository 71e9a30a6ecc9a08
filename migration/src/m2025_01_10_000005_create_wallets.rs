//! Creates prepaid wallets and their transaction ledger.

use sea_orm_migration::prelude::*;

use crate::common::{
    base_columns, create_live_unique_index, create_scope_index, decimal_column,
    drop_index_if_exists, id_column, money_column,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let mut wallets = Table::create()
            .table(Wallets::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut wallets, true);
        wallets
            .col(ColumnDef::new(Wallets::CustomerId).string_len(50).not_null())
            .col(ColumnDef::new(Wallets::Name).string().null())
            .col(ColumnDef::new(Wallets::Currency).string_len(3).not_null())
            .col(ColumnDef::new(Wallets::Description).text().null())
            .col(ColumnDef::new(Wallets::Metadata).json_binary().null())
            .col(money_column(backend, Wallets::Balance))
            .col(money_column(backend, Wallets::CreditBalance))
            .col(
                decimal_column(backend, Wallets::ConversionRate)
                    .not_null()
                    .default(1),
            )
            .col(
                ColumnDef::new(Wallets::WalletStatus)
                    .string_len(20)
                    .not_null()
                    .default("active"),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_wallets_customer_id")
                    .from(Wallets::Table, Wallets::CustomerId)
                    .to(Customers::Table, Customers::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            );
        manager.create_table(wallets).await?;
        create_scope_index(manager, "wallets").await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_wallets_customer_id")
                    .table(Wallets::Table)
                    .col(Wallets::CustomerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let mut transactions = Table::create()
            .table(WalletTransactions::Table)
            .if_not_exists()
            .col(id_column())
            .to_owned();
        base_columns(&mut transactions, true);
        transactions
            .col(ColumnDef::new(WalletTransactions::WalletId).string_len(50).not_null())
            .col(
                ColumnDef::new(WalletTransactions::TransactionType)
                    .string_len(10)
                    .not_null(),
            )
            .col(money_column(backend, WalletTransactions::Amount))
            .col(money_column(backend, WalletTransactions::CreditAmount))
            .col(money_column(backend, WalletTransactions::CreditBalanceBefore))
            .col(money_column(backend, WalletTransactions::CreditBalanceAfter))
            .col(money_column(backend, WalletTransactions::CreditsAvailable))
            .col(
                ColumnDef::new(WalletTransactions::ExpiryDate)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(WalletTransactions::ReferenceType).string_len(30).null())
            .col(ColumnDef::new(WalletTransactions::ReferenceId).string_len(100).null())
            .col(ColumnDef::new(WalletTransactions::Description).text().null())
            .col(ColumnDef::new(WalletTransactions::Metadata).json_binary().null())
            .col(
                ColumnDef::new(WalletTransactions::TransactionStatus)
                    .string_len(20)
                    .not_null()
                    .default("pending"),
            )
            .col(
                ColumnDef::new(WalletTransactions::TransactionReason)
                    .string_len(40)
                    .not_null(),
            )
            .col(ColumnDef::new(WalletTransactions::Priority).integer().null())
            .col(
                ColumnDef::new(WalletTransactions::IdempotencyKey)
                    .string_len(100)
                    .null(),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_wallet_transactions_wallet_id")
                    .from(WalletTransactions::Table, WalletTransactions::WalletId)
                    .to(Wallets::Table, Wallets::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(transactions).await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_wallet_transactions_wallet_id")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::WalletId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        create_live_unique_index(
            manager,
            "idx_wallet_transactions_wallet_idempotency_key",
            "wallet_transactions",
            &["tenant_id", "wallet_id", "idempotency_key"],
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_index_if_exists(manager, "idx_wallet_transactions_wallet_idempotency_key").await?;
        manager
            .drop_table(
                Table::drop()
                    .table(WalletTransactions::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customers {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Wallets {
    Table,
    Id,
    CustomerId,
    Name,
    Currency,
    Description,
    Metadata,
    Balance,
    CreditBalance,
    ConversionRate,
    WalletStatus,
}

#[derive(DeriveIden)]
enum WalletTransactions {
    Table,
    WalletId,
    TransactionType,
    Amount,
    CreditAmount,
    CreditBalanceBefore,
    CreditBalanceAfter,
    CreditsAvailable,
    ExpiryDate,
    ReferenceType,
    ReferenceId,
    Description,
    Metadata,
    TransactionStatus,
    TransactionReason,
    Priority,
    IdempotencyKey,
}
