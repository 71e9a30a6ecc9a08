//! Wallet repository: wallets and their transaction ledger.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::{get_scoped, now, paginate, scoped};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::wallet::{self, WalletStatus};
use crate::models::wallet_transaction::{self, TransactionStatus, TransactionType};
use crate::types::{ListResult, Pagination, TenantScope};

pub struct WalletRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

impl<'a, C: ConnectionTrait> WalletRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn insert(&self, model: wallet::Model) -> RepositoryResult<wallet::Model> {
        self.scope.validate()?;
        let model = wallet::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?;
        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            wallet_id = %model.id,
            customer_id = %model.customer_id,
            currency = %model.currency,
            "Created wallet"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<wallet::Model> {
        get_scoped::<wallet::Entity, _>(self.db, self.scope, "wallet", id).await
    }

    pub async fn list_for_customer(
        &self,
        customer_id: &str,
    ) -> RepositoryResult<Vec<wallet::Model>> {
        Ok(scoped::<wallet::Entity>(self.scope)
            .filter(wallet::Column::CustomerId.eq(customer_id))
            .order_by_asc(wallet::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    /// The active wallet of a customer in `currency`, if any.
    pub async fn find_active(
        &self,
        customer_id: &str,
        currency: &str,
    ) -> RepositoryResult<Option<wallet::Model>> {
        let mut wallets = scoped::<wallet::Entity>(self.scope)
            .filter(wallet::Column::CustomerId.eq(customer_id))
            .filter(wallet::Column::Currency.eq(currency))
            .filter(wallet::Column::WalletStatus.eq(WalletStatus::Active))
            .all(self.db)
            .await?;
        match wallets.len() {
            0 => Ok(None),
            1 => Ok(wallets.pop()),
            _ => Err(RepositoryError::NotSingular(format!(
                "more than one active {currency} wallet for customer {customer_id}"
            ))),
        }
    }

    /// Stores new balances. `balance` is always derived from the credit
    /// balance and conversion rate.
    pub async fn set_credit_balance(
        &self,
        wallet: &wallet::Model,
        credit_balance: Decimal,
    ) -> RepositoryResult<wallet::Model> {
        let balance = credit_balance
            .checked_mul(wallet.conversion_rate)
            .ok_or_else(|| {
                RepositoryError::validation_error("wallet balance exceeds the supported amount range")
            })?;
        let mut model: wallet::ActiveModel = wallet.clone().into();
        model.credit_balance = Set(credit_balance);
        model.balance = Set(balance);
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn set_status(
        &self,
        wallet: &wallet::Model,
        status: WalletStatus,
    ) -> RepositoryResult<wallet::Model> {
        let mut model: wallet::ActiveModel = wallet.clone().into();
        model.wallet_status = Set(status);
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        Ok(model.update(self.db).await?)
    }

    pub async fn insert_transaction(
        &self,
        model: wallet_transaction::Model,
    ) -> RepositoryResult<wallet_transaction::Model> {
        Ok(wallet_transaction::ActiveModel::from(model)
            .reset_all()
            .insert(self.db)
            .await?)
    }

    pub async fn get_transaction(
        &self,
        id: &str,
    ) -> RepositoryResult<wallet_transaction::Model> {
        get_scoped::<wallet_transaction::Entity, _>(self.db, self.scope, "wallet transaction", id)
            .await
    }

    pub async fn find_transaction_by_idempotency_key(
        &self,
        wallet_id: &str,
        key: &str,
    ) -> RepositoryResult<Option<wallet_transaction::Model>> {
        Ok(scoped::<wallet_transaction::Entity>(self.scope)
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
            .filter(wallet_transaction::Column::IdempotencyKey.eq(key))
            .one(self.db)
            .await?)
    }

    pub async fn list_transactions(
        &self,
        wallet_id: &str,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<wallet_transaction::Model>> {
        let select = scoped::<wallet_transaction::Entity>(self.scope)
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id));
        paginate(self.db, select, page).await
    }

    /// Completed credit transactions with credits left, read in batches of
    /// `page_size` rows.
    pub async fn credits_with_remaining(
        &self,
        wallet_id: &str,
        page_size: u64,
    ) -> RepositoryResult<Vec<wallet_transaction::Model>> {
        let page_size = page_size.max(1);
        let mut credits = Vec::new();
        let mut offset = 0;
        loop {
            let batch = scoped::<wallet_transaction::Entity>(self.scope)
                .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
                .filter(wallet_transaction::Column::TransactionType.eq(TransactionType::Credit))
                .filter(
                    wallet_transaction::Column::TransactionStatus.eq(TransactionStatus::Completed),
                )
                .filter(wallet_transaction::Column::CreditsAvailable.gt(Decimal::ZERO))
                .order_by_asc(wallet_transaction::Column::CreatedAt)
                .order_by_asc(wallet_transaction::Column::Id)
                .offset(offset)
                .limit(page_size)
                .all(self.db)
                .await?;
            let fetched = batch.len() as u64;
            credits.extend(batch);
            if fetched < page_size {
                break;
            }
            offset += page_size;
        }
        Ok(credits)
    }

    pub async fn set_credits_available(
        &self,
        transaction: &wallet_transaction::Model,
        credits_available: Decimal,
    ) -> RepositoryResult<()> {
        let mut model: wallet_transaction::ActiveModel = transaction.clone().into();
        model.credits_available = Set(credits_available);
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());
        model.update(self.db).await?;
        Ok(())
    }
}
