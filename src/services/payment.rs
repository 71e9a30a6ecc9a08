//! # Payment Service
//!
//! Records payments against invoices and processes them. Wallet credits
//! and offline payments settle here; card and ACH payments go through the
//! configured [`PaymentGateway`] and fail when there is none.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::invoice::InvoiceService;
use super::wallet::{DebitParams, WalletService};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::invoice::{self, InvoiceStatus};
use crate::models::payment::{self, PaymentDestinationType, PaymentMethodType};
use crate::models::payment_attempt;
use crate::models::wallet_transaction::TransactionReason;
use crate::repositories::payment::PaymentQuery;
use crate::repositories::{InvoiceRepository, PaymentRepository, WalletRepository, now};
use crate::types::{ListResult, Pagination, PaymentStatus, Status, TenantScope, currency, ids};

const NO_GATEWAY: &str = "no payment gateway configured";

/// Whether `invoice` can still take `payment`.
fn payable(invoice: &invoice::Model, payment: &payment::Model) -> Result<(), String> {
    if invoice.invoice_status == InvoiceStatus::Voided {
        return Err("invoice is voided".to_string());
    }
    if invoice.payment_status == PaymentStatus::Succeeded {
        return Err("invoice is already paid".to_string());
    }
    if payment.amount > invoice.amount_remaining {
        return Err(format!(
            "payment amount {} exceeds the amount remaining {}",
            payment.amount, invoice.amount_remaining
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// Generated when absent
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub destination_type: PaymentDestinationType,
    pub destination_id: String,
    pub payment_method_type: PaymentMethodType,
    /// Wallet id for `CREDITS`
    pub payment_method_id: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    #[serde(default = "default_track_attempts")]
    pub track_attempts: bool,
    pub metadata: Option<serde_json::Value>,
    /// Process right after creation
    #[serde(default)]
    pub process_payment: bool,
}

fn default_track_attempts() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentResponse {
    #[serde(flatten)]
    pub payment: payment::Model,
    pub attempts: Vec<payment_attempt::Model>,
}

/// Card and ACH processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the payment. `Ok` carries the gateway's attempt reference,
    /// `Err` the decline message recorded on the payment.
    async fn charge(&self, payment: &payment::Model) -> Result<Option<String>, String>;
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    invoices: InvoiceService,
    wallets: WalletService,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, invoices: InvoiceService, wallets: WalletService) -> Self {
        Self {
            db,
            invoices,
            wallets,
            gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, destination_id = %req.destination_id))]
    pub async fn create_payment(
        &self,
        scope: &TenantScope,
        req: CreatePaymentRequest,
    ) -> RepositoryResult<PaymentResponse> {
        scope.validate()?;
        let db = self.db.as_ref();
        let code = currency::normalize(&req.currency)?;

        let invoice = InvoiceRepository::new(db, scope)
            .get(&req.destination_id)
            .await?;
        if invoice.invoice_status == InvoiceStatus::Voided {
            return Err(RepositoryError::invalid_operation(
                "cannot pay a voided invoice",
            ));
        }
        if invoice.payment_status == PaymentStatus::Succeeded {
            return Err(RepositoryError::invalid_operation(
                "invoice is already paid",
            ));
        }
        if invoice.currency != code {
            return Err(RepositoryError::validation_error(format!(
                "payment currency {code} does not match invoice currency {}",
                invoice.currency
            )));
        }
        if req.amount <= Decimal::ZERO || req.amount > invoice.amount_remaining {
            return Err(RepositoryError::validation_error(format!(
                "amount must be greater than 0 and at most {}",
                invoice.amount_remaining
            )));
        }
        if req.payment_method_type == PaymentMethodType::Credits
            && req.payment_method_id.as_deref().is_none_or(str::is_empty)
        {
            return Err(RepositoryError::validation_error(
                "payment_method_id must name the wallet for credit payments",
            ));
        }

        let repo = PaymentRepository::new(db, scope);
        let idempotency_key = req
            .idempotency_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        if repo.find_by_idempotency_key(&idempotency_key).await?.is_some() {
            return Err(RepositoryError::Constraint(format!(
                "payment with idempotency key {idempotency_key} already exists"
            )));
        }

        let now = now();
        let payment = repo
            .insert(payment::Model {
                id: ids::generate(ids::PAYMENT),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                idempotency_key,
                destination_type: req.destination_type,
                destination_id: req.destination_id,
                payment_method_type: req.payment_method_type,
                payment_method_id: req.payment_method_id,
                amount: req.amount,
                currency: code,
                payment_status: PaymentStatus::Pending,
                track_attempts: req.track_attempts,
                succeeded_at: None,
                failed_at: None,
                error_message: None,
                metadata: req.metadata,
            })
            .await?;

        if req.process_payment {
            return self.process_payment(scope, &payment.id).await;
        }
        Ok(PaymentResponse {
            payment,
            attempts: Vec::new(),
        })
    }

    /// Runs one attempt. Pending and failed payments can be processed.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, payment_id = %id))]
    pub async fn process_payment(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<PaymentResponse> {
        let txn = self.db.begin().await?;
        let repo = PaymentRepository::new(&txn, scope);
        let payment = repo.get(id).await?;
        if !matches!(
            payment.payment_status,
            PaymentStatus::Pending | PaymentStatus::Failed
        ) {
            return Err(RepositoryError::invalid_operation(format!(
                "payment is {:?} and cannot be processed",
                payment.payment_status
            )));
        }

        // Another payment or a void may have landed since this one was created.
        let invoice = InvoiceRepository::new(&txn, scope)
            .get(&payment.destination_id)
            .await?;
        let outcome = match payable(&invoice, &payment) {
            Ok(()) => self.settle(&txn, scope, &payment).await?,
            Err(message) => Err(message),
        };

        if payment.track_attempts {
            let attempt_number = repo.next_attempt_number(&payment.id).await?;
            let now = now();
            repo.insert_attempt(payment_attempt::Model {
                id: ids::generate(ids::PAYMENT_ATTEMPT),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                payment_id: payment.id.clone(),
                attempt_number,
                payment_status: if outcome.is_ok() {
                    PaymentStatus::Succeeded
                } else {
                    PaymentStatus::Failed
                },
                gateway_attempt_id: outcome.as_ref().ok().cloned().flatten(),
                error_message: outcome.as_ref().err().cloned(),
                metadata: None,
            })
            .await?;
        }

        let destination_id = payment.destination_id.clone();
        let mut model = payment.into_active_model();
        match &outcome {
            Ok(_) => {
                model.payment_status = Set(PaymentStatus::Succeeded);
                model.succeeded_at = Set(Some(now()));
                model.error_message = Set(None);
            }
            Err(message) => {
                model.payment_status = Set(PaymentStatus::Failed);
                model.failed_at = Set(Some(now()));
                model.error_message = Set(Some(message.clone()));
            }
        }
        let payment = repo.update(model).await?;

        if outcome.is_ok() {
            self.invoices
                .reconcile_payments_in(&txn, scope, &destination_id)
                .await?;
        }
        let attempts = repo.attempts(&payment.id).await?;
        txn.commit().await?;

        match &outcome {
            Ok(_) => info!(payment_id = %payment.id, amount = %payment.amount, "Payment succeeded"),
            Err(message) => warn!(payment_id = %payment.id, error = %message, "Payment failed"),
        }
        Ok(PaymentResponse { payment, attempts })
    }

    /// Moves the money. The inner `Ok` carries the gateway attempt reference
    /// and `Err` the failure recorded on the payment; database errors abort
    /// the whole transaction instead.
    async fn settle<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        payment: &payment::Model,
    ) -> RepositoryResult<Result<Option<String>, String>> {
        match payment.payment_method_type {
            PaymentMethodType::Offline => Ok(Ok(None)),
            PaymentMethodType::Card | PaymentMethodType::Ach => match &self.gateway {
                Some(gateway) => Ok(gateway.charge(payment).await),
                None => Ok(Err(NO_GATEWAY.to_string())),
            },
            PaymentMethodType::Credits => {
                let Some(wallet_id) = payment.payment_method_id.as_deref() else {
                    return Ok(Err("no wallet referenced".to_string()));
                };
                let wallet = match WalletRepository::new(db, scope).get(wallet_id).await {
                    Ok(wallet) => wallet,
                    Err(e) if e.is_not_found() => return Ok(Err(e.to_string())),
                    Err(e) => return Err(e),
                };
                if wallet.currency != payment.currency {
                    return Ok(Err(format!(
                        "wallet currency {} does not match payment currency {}",
                        wallet.currency, payment.currency
                    )));
                }

                let mut params = DebitParams::new(
                    payment.amount / wallet.conversion_rate,
                    TransactionReason::InvoicePayment,
                );
                params.reference_type = Some("PAYMENT".to_string());
                params.reference_id = Some(payment.id.clone());
                params.description = Some(format!("Payment for invoice {}", payment.destination_id));
                match self.wallets.debit_in(db, scope, wallet_id, params).await {
                    Ok(_) => Ok(Ok(None)),
                    Err(RepositoryError::InvalidOperation(message)) => Ok(Err(message)),
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub async fn get_payment(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<PaymentResponse> {
        let repo = PaymentRepository::new(self.db.as_ref(), scope);
        let payment = repo.get(id).await?;
        let attempts = repo.attempts(id).await?;
        Ok(PaymentResponse { payment, attempts })
    }

    pub async fn list_payments(
        &self,
        scope: &TenantScope,
        query: &PaymentQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<payment::Model>> {
        PaymentRepository::new(self.db.as_ref(), scope)
            .list(query, page)
            .await
    }

    pub async fn list_attempts(
        &self,
        scope: &TenantScope,
        payment_id: &str,
    ) -> RepositoryResult<Vec<payment_attempt::Model>> {
        let repo = PaymentRepository::new(self.db.as_ref(), scope);
        repo.get(payment_id).await?;
        repo.attempts(payment_id).await
    }
}
