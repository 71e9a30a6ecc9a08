//! # Invoice Service
//!
//! Issues invoices, numbers them and tracks their payment state.
//!
//! Creation is idempotent. When the caller omits an idempotency key one is
//! derived from the scope, customer, subscription and period, so retrying
//! the same subscription invoice returns the invoice created first.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::to_utc;
use crate::config::BillingConfig;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::invoice::{self, BillingReason, InvoiceStatus, InvoiceType};
use crate::models::invoice_line_item;
use crate::repositories::invoice::InvoiceQuery;
use crate::repositories::{CustomerRepository, InvoiceRepository, PaymentRepository, now};
use crate::types::{
    BillingPeriod, ListResult, Pagination, PaymentStatus, PriceType, Status, TenantScope,
    currency, ids,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub invoice_type: InvoiceType,
    pub currency: String,
    /// Defaults to the sum of the line item amounts
    #[schema(value_type = Option<String>)]
    pub amount_due: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub amount_paid: Option<Decimal>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub due_date: Option<DateTime<Utc>>,
    pub billing_period: Option<BillingPeriod>,
    #[schema(value_type = Option<String>)]
    pub period_start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub period_end: Option<DateTime<Utc>>,
    pub billing_reason: Option<BillingReason>,
    pub invoice_status: Option<InvoiceStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub idempotency_key: Option<String>,
    pub invoice_pdf_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub line_items: Vec<CreateInvoiceLineItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateInvoiceLineItem {
    pub price_id: Option<String>,
    pub price_type: Option<PriceType>,
    pub plan_id: Option<String>,
    pub plan_display_name: Option<String>,
    pub meter_id: Option<String>,
    pub meter_display_name: Option<String>,
    pub display_name: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[serde(default = "default_quantity")]
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = Option<String>)]
    pub period_start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub period_end: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub line_items: Vec<invoice_line_item::Model>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerInvoiceSummary {
    pub customer_id: String,
    pub currency: String,
    #[schema(value_type = String)]
    pub total_revenue_amount: Decimal,
    #[schema(value_type = String)]
    pub total_unpaid_amount: Decimal,
    #[schema(value_type = String)]
    pub total_overdue_amount: Decimal,
    pub total_invoice_count: u64,
    pub unpaid_invoice_count: u64,
    pub overdue_invoice_count: u64,
    #[schema(value_type = String)]
    pub unpaid_usage_charges: Decimal,
    #[schema(value_type = String)]
    pub unpaid_fixed_charges: Decimal,
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DatabaseConnection>,
    config: BillingConfig,
}

impl InvoiceService {
    pub fn new(db: Arc<DatabaseConnection>, config: BillingConfig) -> Self {
        Self { db, config }
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, customer_id = %req.customer_id))]
    pub async fn create_invoice(
        &self,
        scope: &TenantScope,
        req: CreateInvoiceRequest,
    ) -> RepositoryResult<InvoiceResponse> {
        let txn = self.db.begin().await?;
        let invoice = self.create_invoice_in(&txn, scope, req).await?;
        txn.commit().await?;
        Ok(invoice)
    }

    pub(crate) async fn create_invoice_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        req: CreateInvoiceRequest,
    ) -> RepositoryResult<InvoiceResponse> {
        scope.validate()?;
        let code = currency::normalize(&req.currency)?;
        let amount_due = validate_request(&req)?;
        CustomerRepository::new(db, scope)
            .get(&req.customer_id)
            .await?;

        let repo = InvoiceRepository::new(db, scope);
        let idempotency_key = match &req.idempotency_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => derive_idempotency_key(scope, &req),
        };
        if let Some(existing) = repo.find_by_idempotency_key(&idempotency_key).await? {
            debug!(invoice_id = %existing.id, "Invoice already exists for idempotency key");
            let line_items = repo.line_items(&existing.id).await?;
            return Ok(InvoiceResponse {
                invoice: existing,
                line_items,
            });
        }

        let mut billing_sequence = None;
        let mut billing_reason = req.billing_reason;
        if req.invoice_type == InvoiceType::Subscription {
            let (Some(subscription_id), Some(start), Some(end)) =
                (&req.subscription_id, req.period_start, req.period_end)
            else {
                return Err(RepositoryError::validation_error(
                    "subscription invoices require subscription_id, period_start and period_end",
                ));
            };
            if let Some(existing) = repo
                .find_for_period(subscription_id, start.into(), end.into())
                .await?
            {
                return Err(RepositoryError::Constraint(format!(
                    "invoice {} already covers this subscription period",
                    existing.id
                )));
            }
            let sequence = repo.next_billing_sequence(subscription_id).await?;
            billing_sequence = Some(sequence);
            billing_reason.get_or_insert(if sequence == 1 {
                BillingReason::SubscriptionCreate
            } else {
                BillingReason::SubscriptionCycle
            });
        }

        let issued_at = Utc::now();
        let invoice_number = self.next_invoice_number(&repo, issued_at).await?;

        let (default_status, default_payment) = match req.invoice_type {
            InvoiceType::Subscription => (InvoiceStatus::Draft, PaymentStatus::Pending),
            InvoiceType::OneOff | InvoiceType::Credit => {
                (InvoiceStatus::Finalized, PaymentStatus::Succeeded)
            }
        };
        let invoice_status = req.invoice_status.unwrap_or(default_status);
        let payment_status = req.payment_status.unwrap_or(default_payment);
        let amount_paid = match req.amount_paid {
            Some(paid) => paid,
            None if payment_status == PaymentStatus::Succeeded => amount_due,
            None => Decimal::ZERO,
        };
        if amount_paid > amount_due {
            return Err(RepositoryError::validation_error(
                "amount_paid must not exceed amount_due",
            ));
        }

        let now = now();
        let due_date = req
            .due_date
            .unwrap_or_else(|| issued_at + Duration::days(i64::from(self.config.invoice_due_days)));
        let invoice = invoice::Model {
            id: ids::generate(ids::INVOICE),
            tenant_id: scope.tenant_id.clone(),
            environment_id: scope.environment_id.clone(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: scope.actor(),
            updated_by: scope.actor(),
            customer_id: req.customer_id,
            subscription_id: req.subscription_id,
            invoice_type: req.invoice_type,
            invoice_status,
            payment_status,
            currency: code,
            amount_due,
            amount_paid,
            amount_remaining: amount_due - amount_paid,
            description: req.description,
            due_date: Some(due_date.into()),
            paid_at: (payment_status == PaymentStatus::Succeeded).then_some(now),
            voided_at: None,
            finalized_at: (invoice_status == InvoiceStatus::Finalized).then_some(now),
            billing_period: req.billing_period,
            period_start: req.period_start.map(Into::into),
            period_end: req.period_end.map(Into::into),
            invoice_pdf_url: req.invoice_pdf_url,
            billing_reason,
            metadata: req.metadata,
            version: 1,
            invoice_number: Some(invoice_number),
            billing_sequence,
            idempotency_key: Some(idempotency_key),
        };

        let line_items: Vec<invoice_line_item::Model> = req
            .line_items
            .into_iter()
            .map(|item| invoice_line_item::Model {
                id: ids::generate(ids::INVOICE_LINE_ITEM),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                invoice_id: invoice.id.clone(),
                customer_id: invoice.customer_id.clone(),
                subscription_id: invoice.subscription_id.clone(),
                plan_id: item.plan_id,
                plan_display_name: item.plan_display_name,
                price_id: item.price_id,
                price_type: item.price_type,
                meter_id: item.meter_id,
                meter_display_name: item.meter_display_name,
                display_name: item.display_name,
                amount: item.amount,
                quantity: item.quantity,
                currency: invoice.currency.clone(),
                period_start: item.period_start.map(Into::into),
                period_end: item.period_end.map(Into::into),
                metadata: item.metadata,
            })
            .collect();

        let invoice = repo
            .create_with_line_items(invoice, line_items.clone())
            .await?;
        info!(
            invoice_id = %invoice.id,
            invoice_number = invoice.invoice_number.as_deref().unwrap_or_default(),
            invoice_type = ?invoice.invoice_type,
            amount_due = %invoice.amount_due,
            "Created invoice"
        );
        Ok(InvoiceResponse {
            invoice,
            line_items,
        })
    }

    /// `"{prefix}-{YYYYMM}-{seq:05}"`, the sequence restarting every month.
    async fn next_invoice_number<C: ConnectionTrait>(
        &self,
        repo: &InvoiceRepository<'_, C>,
        at: DateTime<Utc>,
    ) -> RepositoryResult<String> {
        let sequence = repo.next_invoice_sequence(at).await?;
        Ok(format!(
            "{}-{}-{sequence:05}",
            self.config.invoice_number_prefix,
            at.format("%Y%m")
        ))
    }

    pub async fn get_invoice(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<InvoiceResponse> {
        let repo = InvoiceRepository::new(self.db.as_ref(), scope);
        let invoice = repo.get(id).await?;
        let line_items = repo.line_items(id).await?;
        Ok(InvoiceResponse {
            invoice,
            line_items,
        })
    }

    pub async fn list_invoices(
        &self,
        scope: &TenantScope,
        query: &InvoiceQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<invoice::Model>> {
        InvoiceRepository::new(self.db.as_ref(), scope)
            .list(query, page)
            .await
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, invoice_id = %id))]
    pub async fn finalize_invoice(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<invoice::Model> {
        let repo = InvoiceRepository::new(self.db.as_ref(), scope);
        let invoice = repo.get(id).await?;
        if invoice.invoice_status != InvoiceStatus::Draft {
            return Err(RepositoryError::invalid_operation(format!(
                "invoice is {:?}, only drafts can be finalized",
                invoice.invoice_status
            )));
        }

        let version = invoice.version;
        let mut model = invoice.into_active_model();
        model.invoice_status = Set(InvoiceStatus::Finalized);
        model.finalized_at = Set(Some(now()));
        let invoice = repo.update(model, version).await?;
        info!(invoice_id = %invoice.id, "Finalized invoice");
        Ok(invoice)
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, invoice_id = %id))]
    pub async fn void_invoice(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<invoice::Model> {
        let repo = InvoiceRepository::new(self.db.as_ref(), scope);
        let invoice = repo.get(id).await?;
        if invoice.invoice_status == InvoiceStatus::Voided {
            return Err(RepositoryError::invalid_operation(
                "invoice is already voided",
            ));
        }
        if invoice.payment_status == PaymentStatus::Succeeded {
            return Err(RepositoryError::invalid_operation(
                "a paid invoice cannot be voided",
            ));
        }

        let version = invoice.version;
        let mut model = invoice.into_active_model();
        model.invoice_status = Set(InvoiceStatus::Voided);
        model.voided_at = Set(Some(now()));
        let invoice = repo.update(model, version).await?;
        info!(invoice_id = %invoice.id, "Voided invoice");
        Ok(invoice)
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, invoice_id = %id))]
    pub async fn update_payment_status(
        &self,
        scope: &TenantScope,
        id: &str,
        req: UpdatePaymentStatusRequest,
    ) -> RepositoryResult<invoice::Model> {
        let repo = InvoiceRepository::new(self.db.as_ref(), scope);
        let invoice = repo.get(id).await?;

        if invoice.invoice_status == InvoiceStatus::Voided {
            return Err(RepositoryError::invalid_operation(
                "payment status of a voided invoice cannot change",
            ));
        }
        if req.amount.is_some_and(|amount| amount < Decimal::ZERO) {
            return Err(RepositoryError::validation_error(
                "amount must not be negative",
            ));
        }
        if !payment_transition_allowed(invoice.payment_status, req.payment_status) {
            return Err(RepositoryError::invalid_operation(format!(
                "invalid payment status transition {:?} -> {:?}",
                invoice.payment_status, req.payment_status
            )));
        }

        let version = invoice.version;
        let amount_due = invoice.amount_due;
        let mut model = invoice.into_active_model();
        model.payment_status = Set(req.payment_status);
        match req.payment_status {
            PaymentStatus::Pending => {
                if let Some(amount) = req.amount {
                    if amount > amount_due {
                        return Err(RepositoryError::validation_error(
                            "amount must not exceed amount_due",
                        ));
                    }
                    model.amount_paid = Set(amount);
                    model.amount_remaining = Set(amount_due - amount);
                }
            }
            PaymentStatus::Succeeded => {
                model.amount_paid = Set(amount_due);
                model.amount_remaining = Set(Decimal::ZERO);
                model.paid_at = Set(Some(now()));
            }
            PaymentStatus::Failed => {
                model.amount_paid = Set(Decimal::ZERO);
                model.amount_remaining = Set(amount_due);
                model.paid_at = Set(None);
            }
            PaymentStatus::Processing | PaymentStatus::Refunded => {}
        }

        let invoice = repo.update(model, version).await?;
        info!(
            invoice_id = %invoice.id,
            payment_status = ?invoice.payment_status,
            "Updated invoice payment status"
        );
        Ok(invoice)
    }

    /// Recomputes paid and remaining amounts from the succeeded payments of
    /// the invoice. A fully paid invoice becomes `SUCCEEDED`.
    pub(crate) async fn reconcile_payments_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        invoice_id: &str,
    ) -> RepositoryResult<invoice::Model> {
        let repo = InvoiceRepository::new(db, scope);
        let invoice = repo.get(invoice_id).await?;
        let paid: Decimal = PaymentRepository::new(db, scope)
            .succeeded_for_invoice(invoice_id)
            .await?
            .iter()
            .map(|payment| payment.amount)
            .sum();
        let paid = paid.min(invoice.amount_due);
        let remaining = invoice.amount_due - paid;

        let version = invoice.version;
        let mut model = invoice.into_active_model();
        model.amount_paid = Set(paid);
        model.amount_remaining = Set(remaining);
        if remaining <= Decimal::ZERO {
            model.payment_status = Set(PaymentStatus::Succeeded);
            model.paid_at = Set(Some(now()));
        }
        let invoice = repo.update(model, version).await?;
        debug!(
            invoice_id = %invoice.id,
            amount_paid = %invoice.amount_paid,
            amount_remaining = %invoice.amount_remaining,
            "Reconciled invoice payments"
        );
        Ok(invoice)
    }

    pub async fn customer_invoice_summary(
        &self,
        scope: &TenantScope,
        customer_id: &str,
        currency_code: &str,
    ) -> RepositoryResult<CustomerInvoiceSummary> {
        let db = self.db.as_ref();
        let code = currency::normalize(currency_code)?;
        CustomerRepository::new(db, scope).get(customer_id).await?;

        let repo = InvoiceRepository::new(db, scope);
        let invoices = repo.list_open_for_customer(customer_id, Some(&code)).await?;
        let now = Utc::now();

        let mut summary = CustomerInvoiceSummary {
            customer_id: customer_id.to_string(),
            currency: code,
            total_revenue_amount: Decimal::ZERO,
            total_unpaid_amount: Decimal::ZERO,
            total_overdue_amount: Decimal::ZERO,
            total_invoice_count: 0,
            unpaid_invoice_count: 0,
            overdue_invoice_count: 0,
            unpaid_usage_charges: Decimal::ZERO,
            unpaid_fixed_charges: Decimal::ZERO,
        };
        let mut unpaid_ids = HashSet::new();

        for invoice in &invoices {
            summary.total_invoice_count += 1;
            summary.total_revenue_amount += invoice.amount_due;
            if invoice.payment_status == PaymentStatus::Succeeded {
                continue;
            }
            summary.unpaid_invoice_count += 1;
            summary.total_unpaid_amount += invoice.amount_remaining;
            unpaid_ids.insert(invoice.id.clone());
            if invoice.due_date.is_some_and(|due| to_utc(due) < now) {
                summary.overdue_invoice_count += 1;
                summary.total_overdue_amount += invoice.amount_remaining;
            }
        }

        let ids: Vec<String> = unpaid_ids.into_iter().collect();
        for item in repo.line_items_for_invoices(&ids).await? {
            match item.price_type {
                Some(PriceType::Usage) => summary.unpaid_usage_charges += item.amount,
                _ => summary.unpaid_fixed_charges += item.amount,
            }
        }

        Ok(summary)
    }
}

/// Checks amounts and periods and returns the effective `amount_due`.
fn validate_request(req: &CreateInvoiceRequest) -> RepositoryResult<Decimal> {
    if req.customer_id.trim().is_empty() {
        return Err(RepositoryError::validation_error("customer_id is required"));
    }
    if let (Some(start), Some(end)) = (req.period_start, req.period_end) {
        if start >= end {
            return Err(RepositoryError::validation_error(
                "period_start must be before period_end",
            ));
        }
    }
    for item in &req.line_items {
        if item.amount < Decimal::ZERO || item.quantity < Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "line item amount and quantity must not be negative",
            ));
        }
    }
    if req.amount_paid.is_some_and(|paid| paid < Decimal::ZERO) {
        return Err(RepositoryError::validation_error(
            "amount_paid must not be negative",
        ));
    }

    let amount_due = match req.amount_due {
        Some(amount) => amount,
        None if req.line_items.is_empty() => {
            return Err(RepositoryError::validation_error(
                "line_items are required when amount_due is omitted",
            ));
        }
        None => checked_total(req.line_items.iter().map(|item| item.amount))?,
    };
    if amount_due < Decimal::ZERO {
        return Err(RepositoryError::validation_error(
            "amount_due must not be negative",
        ));
    }
    Ok(amount_due)
}

/// SHA-256 over the scope, customer, subscription and period. Invoices
/// without a subscription period also mix in a random nonce, so unrelated
/// one-off invoices never collapse into one.
fn derive_idempotency_key(scope: &TenantScope, req: &CreateInvoiceRequest) -> String {
    let period = |value: Option<DateTime<Utc>>| value.map(|v| v.to_rfc3339()).unwrap_or_default();
    let nonce = match (&req.subscription_id, req.period_start, req.period_end) {
        (Some(_), Some(_), Some(_)) => String::new(),
        _ => uuid::Uuid::new_v4().simple().to_string(),
    };

    let mut hasher = Sha256::new();
    for part in [
        scope.tenant_id.as_str(),
        scope.environment_id.as_str(),
        req.customer_id.as_str(),
        req.subscription_id.as_deref().unwrap_or_default(),
        &period(req.period_start),
        &period(req.period_end),
        &nonce,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

fn payment_transition_allowed(from: PaymentStatus, to: PaymentStatus) -> bool {
    matches!(
        (from, to),
        (
            PaymentStatus::Pending,
            PaymentStatus::Pending | PaymentStatus::Succeeded | PaymentStatus::Failed
        ) | (PaymentStatus::Failed, PaymentStatus::Pending)
    )
}
