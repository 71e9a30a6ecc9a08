//! # Wallet Service
//!
//! Prepaid credit wallets. Every balance change writes a ledger row in the
//! same transaction as the wallet update, so after each operation
//! `credit_balance` equals credits minus debits and matches the
//! `credit_balance_after` of the latest transaction.
//!
//! Debits consume eligible credits (completed, unexpired, with credits
//! left) in expiry order, soonest first, with never-expiring credits last
//! and larger grants first within the same expiry.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::to_utc;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::wallet::{self, WalletStatus};
use crate::models::wallet_transaction::{
    self, TransactionReason, TransactionStatus, TransactionType,
};
use crate::repositories::{CustomerRepository, InvoiceRepository, WalletRepository, now};
use crate::types::{ListResult, Pagination, PaymentStatus, Status, TenantScope, currency, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWalletRequest {
    pub customer_id: String,
    pub currency: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Currency value of one credit (default 1)
    #[schema(value_type = Option<String>)]
    pub conversion_rate: Option<Decimal>,
    /// Credits granted on creation as `FREE_CREDIT_GRANT`
    #[schema(value_type = Option<String>)]
    pub initial_credits: Option<Decimal>,
    pub metadata: Option<serde_json::Value>,
}

/// Top-up request. Either `credits_to_add` or a currency `amount` is given.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TopUpRequest {
    #[schema(value_type = Option<String>)]
    pub credits_to_add: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub transaction_reason: Option<TransactionReason>,
    #[schema(value_type = Option<String>)]
    pub expiry_date: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub metadata: Option<serde_json::Value>,
}

/// Debit request, in credits.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DebitRequest {
    #[schema(value_type = String)]
    pub credits: Decimal,
    pub transaction_reason: Option<TransactionReason>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Ledger credit applied by other services.
#[derive(Debug, Clone)]
pub struct CreditParams {
    pub credits: Decimal,
    pub reason: TransactionReason,
    pub expiry_date: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreditParams {
    pub fn new(credits: Decimal, reason: TransactionReason) -> Self {
        Self {
            credits,
            reason,
            expiry_date: None,
            idempotency_key: None,
            description: None,
            priority: None,
            reference_type: None,
            reference_id: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DebitParams {
    pub credits: Decimal,
    pub reason: TransactionReason,
    pub idempotency_key: Option<String>,
    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl DebitParams {
    pub fn new(credits: Decimal, reason: TransactionReason) -> Self {
        Self {
            credits,
            reason,
            idempotency_key: None,
            description: None,
            reference_type: None,
            reference_id: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletBalance {
    pub wallet: wallet::Model,
    /// `balance` minus unpaid invoices in the wallet currency
    #[schema(value_type = String)]
    pub real_time_balance: Decimal,
    #[schema(value_type = String)]
    pub real_time_credit_balance: Decimal,
    #[schema(value_type = String)]
    pub unpaid_invoice_amount: Decimal,
}

#[derive(Clone)]
pub struct WalletService {
    db: Arc<DatabaseConnection>,
    credit_page_size: u64,
}

impl WalletService {
    pub fn new(db: Arc<DatabaseConnection>, credit_page_size: u64) -> Self {
        Self {
            db,
            credit_page_size,
        }
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id))]
    pub async fn create_wallet(
        &self,
        scope: &TenantScope,
        req: CreateWalletRequest,
    ) -> RepositoryResult<wallet::Model> {
        let txn = self.db.begin().await?;
        let wallet = self.create_wallet_in(&txn, scope, req).await?;
        txn.commit().await?;
        Ok(wallet)
    }

    pub(crate) async fn create_wallet_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        req: CreateWalletRequest,
    ) -> RepositoryResult<wallet::Model> {
        scope.validate()?;
        let code = currency::normalize(&req.currency)?;
        let conversion_rate = req.conversion_rate.unwrap_or(Decimal::ONE);
        if conversion_rate <= Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "conversion_rate must be greater than 0",
            ));
        }
        CustomerRepository::new(db, scope).get(&req.customer_id).await?;

        let repo = WalletRepository::new(db, scope);
        if repo.find_active(&req.customer_id, &code).await?.is_some() {
            return Err(RepositoryError::invalid_operation(format!(
                "customer {} already has an active {code} wallet",
                req.customer_id
            )));
        }

        let now = now();
        let wallet = repo
            .insert(wallet::Model {
                id: ids::generate(ids::WALLET),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                customer_id: req.customer_id,
                name: req.name,
                currency: code,
                description: req.description,
                metadata: req.metadata,
                balance: Decimal::ZERO,
                credit_balance: Decimal::ZERO,
                conversion_rate,
                wallet_status: WalletStatus::Active,
            })
            .await?;

        match req.initial_credits {
            Some(credits) if credits > Decimal::ZERO => {
                let mut params = CreditParams::new(credits, TransactionReason::FreeCreditGrant);
                params.description = Some("Initial wallet credits".to_string());
                self.credit_in(db, scope, &wallet.id, params).await?;
                WalletRepository::new(db, scope).get(&wallet.id).await
            }
            _ => Ok(wallet),
        }
    }

    pub async fn get_wallet(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<wallet::Model> {
        WalletRepository::new(self.db.as_ref(), scope).get(id).await
    }

    pub async fn list_customer_wallets(
        &self,
        scope: &TenantScope,
        customer_id: &str,
    ) -> RepositoryResult<Vec<wallet::Model>> {
        CustomerRepository::new(self.db.as_ref(), scope)
            .get(customer_id)
            .await?;
        WalletRepository::new(self.db.as_ref(), scope)
            .list_for_customer(customer_id)
            .await
    }

    /// Adds credits, either given directly or converted from a currency
    /// amount.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, wallet_id = %wallet_id))]
    pub async fn top_up(
        &self,
        scope: &TenantScope,
        wallet_id: &str,
        req: TopUpRequest,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let reason = req
            .transaction_reason
            .unwrap_or(TransactionReason::PurchasedCreditDirect);
        if !reason.is_credit() {
            return Err(RepositoryError::validation_error(format!(
                "{reason:?} is not a credit reason"
            )));
        }

        let txn = self.db.begin().await?;
        let wallet = WalletRepository::new(&txn, scope).get(wallet_id).await?;
        let credits = match (req.credits_to_add, req.amount) {
            (Some(credits), _) => credits,
            (None, Some(amount)) => amount
                .checked_div(wallet.conversion_rate)
                .ok_or_else(out_of_range)?,
            (None, None) => {
                return Err(RepositoryError::validation_error(
                    "either credits_to_add or amount is required",
                ));
            }
        };

        let params = CreditParams {
            credits,
            reason,
            expiry_date: req.expiry_date,
            idempotency_key: req.idempotency_key,
            description: req.description,
            priority: req.priority,
            reference_type: None,
            reference_id: None,
            metadata: req.metadata,
        };
        let transaction = self.credit_in(&txn, scope, wallet_id, params).await?;
        txn.commit().await?;
        Ok(transaction)
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, wallet_id = %wallet_id))]
    pub async fn debit(
        &self,
        scope: &TenantScope,
        wallet_id: &str,
        req: DebitRequest,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let reason = req
            .transaction_reason
            .unwrap_or(TransactionReason::ManualBalanceDebit);
        if reason.is_credit() {
            return Err(RepositoryError::validation_error(format!(
                "{reason:?} is not a debit reason"
            )));
        }
        let params = DebitParams {
            credits: req.credits,
            reason,
            idempotency_key: req.idempotency_key,
            description: req.description,
            reference_type: None,
            reference_id: None,
            metadata: req.metadata,
        };

        let txn = self.db.begin().await?;
        let transaction = self.debit_in(&txn, scope, wallet_id, params).await?;
        txn.commit().await?;
        Ok(transaction)
    }

    /// Writes a completed credit and raises the wallet balance. A repeated
    /// idempotency key returns the transaction recorded the first time.
    pub(crate) async fn credit_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        wallet_id: &str,
        params: CreditParams,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let repo = WalletRepository::new(db, scope);
        let wallet = repo.get(wallet_id).await?;
        require_active(&wallet)?;
        if params.credits <= Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "credit amount must be greater than 0",
            ));
        }
        if let Some(key) = &params.idempotency_key {
            if let Some(existing) = repo.find_transaction_by_idempotency_key(wallet_id, key).await? {
                debug!(transaction_id = %existing.id, "Wallet credit already applied");
                return Ok(existing);
            }
        }

        let before = wallet.credit_balance;
        let after = before
            .checked_add(params.credits)
            .filter(|after| after.checked_mul(wallet.conversion_rate).is_some())
            .ok_or_else(out_of_range)?;
        let transaction = repo
            .insert_transaction(ledger_row(
                scope,
                &wallet,
                TransactionType::Credit,
                params.credits,
                before,
                after,
                LedgerDetails {
                    credits_available: params.credits,
                    expiry_date: params.expiry_date,
                    reason: params.reason,
                    priority: params.priority,
                    idempotency_key: params.idempotency_key,
                    description: params.description,
                    reference_type: params.reference_type,
                    reference_id: params.reference_id,
                    metadata: params.metadata,
                },
            ))
            .await?;
        repo.set_credit_balance(&wallet, after).await?;

        info!(
            wallet_id = %wallet.id,
            transaction_id = %transaction.id,
            credits = %params.credits,
            reason = ?params.reason,
            "Credited wallet"
        );
        Ok(transaction)
    }

    /// Consumes eligible credits and writes one debit. Nothing is written
    /// when the eligible credits do not cover the amount.
    pub(crate) async fn debit_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        wallet_id: &str,
        params: DebitParams,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let repo = WalletRepository::new(db, scope);
        let wallet = repo.get(wallet_id).await?;
        require_active(&wallet)?;
        if params.credits <= Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "debit amount must be greater than 0",
            ));
        }
        if let Some(key) = &params.idempotency_key {
            if let Some(existing) = repo.find_transaction_by_idempotency_key(wallet_id, key).await? {
                debug!(transaction_id = %existing.id, "Wallet debit already applied");
                return Ok(existing);
            }
        }

        let credits = eligible_credits(repo.credits_with_remaining(wallet_id, self.credit_page_size).await?, Utc::now());
        self.consume_and_record(&repo, scope, &wallet, credits, params)
            .await
    }

    async fn consume_and_record<C: ConnectionTrait>(
        &self,
        repo: &WalletRepository<'_, C>,
        scope: &TenantScope,
        wallet: &wallet::Model,
        credits: Vec<wallet_transaction::Model>,
        params: DebitParams,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let available: Decimal = credits.iter().map(|c| c.credits_available).sum();
        if available < params.credits {
            return Err(RepositoryError::invalid_operation(format!(
                "insufficient balance: {available} credits available, {} requested",
                params.credits
            )));
        }

        let mut remaining = params.credits;
        for credit in &credits {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = credit.credits_available.min(remaining);
            repo.set_credits_available(credit, credit.credits_available - take)
                .await?;
            remaining -= take;
        }

        let before = wallet.credit_balance;
        let after = before - params.credits;
        let transaction = repo
            .insert_transaction(ledger_row(
                scope,
                wallet,
                TransactionType::Debit,
                params.credits,
                before,
                after,
                LedgerDetails {
                    credits_available: Decimal::ZERO,
                    expiry_date: None,
                    reason: params.reason,
                    priority: None,
                    idempotency_key: params.idempotency_key,
                    description: params.description,
                    reference_type: params.reference_type,
                    reference_id: params.reference_id,
                    metadata: params.metadata,
                },
            ))
            .await?;
        repo.set_credit_balance(wallet, after).await?;

        info!(
            wallet_id = %wallet.id,
            transaction_id = %transaction.id,
            credits = %params.credits,
            reason = ?params.reason,
            "Debited wallet"
        );
        Ok(transaction)
    }

    /// Debits what is left of an expired credit.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, transaction_id = %transaction_id))]
    pub async fn expire_credits(
        &self,
        scope: &TenantScope,
        transaction_id: &str,
    ) -> RepositoryResult<wallet_transaction::Model> {
        let txn = self.db.begin().await?;
        let repo = WalletRepository::new(&txn, scope);
        let credit = repo.get_transaction(transaction_id).await?;

        if credit.transaction_type != TransactionType::Credit {
            return Err(RepositoryError::invalid_operation(
                "only credit transactions can expire",
            ));
        }
        let expired = credit
            .expiry_date
            .is_some_and(|expiry| to_utc(expiry) < Utc::now());
        if !expired {
            return Err(RepositoryError::invalid_operation(
                "credit has not expired",
            ));
        }
        if credit.credits_available <= Decimal::ZERO {
            return Err(RepositoryError::invalid_operation(
                "credit has no remaining credits",
            ));
        }

        let wallet = repo.get(&credit.wallet_id).await?;
        if wallet.wallet_status == WalletStatus::Closed {
            return Err(RepositoryError::invalid_operation("wallet is closed"));
        }
        let mut params = DebitParams::new(credit.credits_available, TransactionReason::CreditExpired);
        params.reference_type = Some("WALLET_TRANSACTION".to_string());
        params.reference_id = Some(credit.id.clone());
        params.description = Some("Expired credits".to_string());

        let transaction = self
            .consume_and_record(&repo, scope, &wallet, vec![credit], params)
            .await?;
        txn.commit().await?;
        Ok(transaction)
    }

    /// Debits the remaining balance, expired credits included, and closes
    /// the wallet.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, wallet_id = %wallet_id))]
    pub async fn terminate_wallet(
        &self,
        scope: &TenantScope,
        wallet_id: &str,
    ) -> RepositoryResult<wallet::Model> {
        let txn = self.db.begin().await?;
        let repo = WalletRepository::new(&txn, scope);
        let wallet = repo.get(wallet_id).await?;
        if wallet.wallet_status == WalletStatus::Closed {
            return Err(RepositoryError::invalid_operation(
                "wallet is already closed",
            ));
        }

        if wallet.credit_balance > Decimal::ZERO {
            let mut credits = repo.credits_with_remaining(wallet_id, self.credit_page_size).await?;
            sort_for_consumption(&mut credits);
            let mut params =
                DebitParams::new(wallet.credit_balance, TransactionReason::WalletTermination);
            params.description = Some("Wallet terminated".to_string());
            self.consume_and_record(&repo, scope, &wallet, credits, params)
                .await?;
        }

        let wallet = repo.get(wallet_id).await?;
        let wallet = repo.set_status(&wallet, WalletStatus::Closed).await?;
        txn.commit().await?;
        info!(wallet_id = %wallet.id, "Terminated wallet");
        Ok(wallet)
    }

    pub async fn get_balance(
        &self,
        scope: &TenantScope,
        wallet_id: &str,
    ) -> RepositoryResult<WalletBalance> {
        let db = self.db.as_ref();
        let wallet = WalletRepository::new(db, scope).get(wallet_id).await?;

        if wallet.wallet_status != WalletStatus::Active {
            return Ok(WalletBalance {
                wallet,
                real_time_balance: Decimal::ZERO,
                real_time_credit_balance: Decimal::ZERO,
                unpaid_invoice_amount: Decimal::ZERO,
            });
        }

        let unpaid: Decimal = InvoiceRepository::new(db, scope)
            .list_open_for_customer(&wallet.customer_id, Some(&wallet.currency))
            .await?
            .iter()
            .filter(|invoice| invoice.payment_status != PaymentStatus::Succeeded)
            .map(|invoice| invoice.amount_remaining)
            .sum();

        let real_time_balance = wallet.balance - unpaid;
        let real_time_credit_balance = real_time_balance / wallet.conversion_rate;
        Ok(WalletBalance {
            real_time_balance,
            real_time_credit_balance,
            unpaid_invoice_amount: unpaid,
            wallet,
        })
    }

    pub async fn list_transactions(
        &self,
        scope: &TenantScope,
        wallet_id: &str,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<wallet_transaction::Model>> {
        let repo = WalletRepository::new(self.db.as_ref(), scope);
        repo.get(wallet_id).await?;
        repo.list_transactions(wallet_id, page).await
    }
}

fn out_of_range() -> RepositoryError {
    RepositoryError::validation_error("wallet balance exceeds the supported amount range")
}

fn require_active(wallet: &wallet::Model) -> RepositoryResult<()> {
    if wallet.wallet_status != WalletStatus::Active {
        return Err(RepositoryError::invalid_operation(format!(
            "wallet {} is not active",
            wallet.id
        )));
    }
    Ok(())
}

/// Unexpired credits in consumption order.
fn eligible_credits(
    credits: Vec<wallet_transaction::Model>,
    at: DateTime<Utc>,
) -> Vec<wallet_transaction::Model> {
    let mut credits: Vec<_> = credits
        .into_iter()
        .filter(|credit| credit.expiry_date.is_none_or(|expiry| to_utc(expiry) > at))
        .collect();
    sort_for_consumption(&mut credits);
    credits
}

fn sort_for_consumption(credits: &mut [wallet_transaction::Model]) {
    credits.sort_by(|a, b| {
        let by_expiry = match (a.expiry_date, b.expiry_date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_expiry
            .then_with(|| b.credit_amount.cmp(&a.credit_amount))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

struct LedgerDetails {
    credits_available: Decimal,
    expiry_date: Option<DateTime<Utc>>,
    reason: TransactionReason,
    priority: Option<i32>,
    idempotency_key: Option<String>,
    description: Option<String>,
    reference_type: Option<String>,
    reference_id: Option<String>,
    metadata: Option<serde_json::Value>,
}

fn ledger_row(
    scope: &TenantScope,
    wallet: &wallet::Model,
    transaction_type: TransactionType,
    credits: Decimal,
    before: Decimal,
    after: Decimal,
    details: LedgerDetails,
) -> wallet_transaction::Model {
    let now = now();
    wallet_transaction::Model {
        id: ids::generate(ids::WALLET_TRANSACTION),
        tenant_id: scope.tenant_id.clone(),
        environment_id: scope.environment_id.clone(),
        status: Status::Published,
        created_at: now,
        updated_at: now,
        created_by: scope.actor(),
        updated_by: scope.actor(),
        wallet_id: wallet.id.clone(),
        transaction_type,
        amount: credits * wallet.conversion_rate,
        credit_amount: credits,
        credit_balance_before: before,
        credit_balance_after: after,
        credits_available: details.credits_available,
        expiry_date: details.expiry_date.map(Into::into),
        reference_type: details.reference_type,
        reference_id: details.reference_id,
        description: details.description,
        metadata: details.metadata,
        transaction_status: TransactionStatus::Completed,
        transaction_reason: details.reason,
        priority: details.priority,
        idempotency_key: details.idempotency_key,
    }
}
