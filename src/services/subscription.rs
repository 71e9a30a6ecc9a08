//! # Subscription Service
//!
//! Subscription lifecycle, period advancement and invoice preparation,
//! plus subscription schedules (ordered phases walked one at a time).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::billing_period::{add_days, period_end_for, validate_period_count};
use super::invoice::{CreateInvoiceLineItem, CreateInvoiceRequest, InvoiceResponse, InvoiceService};
use super::pricing::calculate_cost;
use super::{checked_total, to_utc};
use super::wallet::{CreateWalletRequest, CreditParams, WalletService};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::invoice::InvoiceType;
use crate::models::subscription::{self, SubscriptionStatus};
use crate::models::subscription_schedule::{self, EndBehavior, ScheduleStatus};
use crate::models::wallet_transaction::TransactionReason;
use crate::models::{credit_grant, subscription_line_item, subscription_schedule_phase};
use crate::repositories::subscription::SubscriptionQuery;
use crate::repositories::{
    CreditGrantRepository, CustomerRepository, MeterRepository, PlanRepository, PriceRepository,
    SubscriptionRepository, SubscriptionScheduleRepository, WalletRepository, now,
};
use crate::types::{
    BillingCadence, BillingPeriod, ListResult, Pagination, PriceType, Status, TenantScope,
    currency, ids,
};

/// Longest trial a subscription can start with.
pub const MAX_TRIAL_DAYS: u32 = 3650;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub currency: String,
    pub billing_period: BillingPeriod,
    #[serde(default = "default_period_count")]
    pub billing_period_count: i32,
    #[serde(default)]
    pub billing_cadence: BillingCadence,
    /// Defaults to now
    #[schema(value_type = Option<String>)]
    pub start_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTime<Utc>>,
    /// Defaults to `start_date`
    #[schema(value_type = Option<String>)]
    pub billing_anchor: Option<DateTime<Utc>>,
    pub trial_days: Option<u32>,
    pub lookup_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

fn default_period_count() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub subscription: subscription::Model,
    pub line_items: Vec<subscription_line_item::Model>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelSubscriptionRequest {
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

/// Usage per meter id for the period being billed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UsageRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub usage: HashMap<String, Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenewResponse {
    pub subscription: subscription::Model,
    pub invoice: InvoiceResponse,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SchedulePhaseInput {
    #[schema(value_type = String)]
    pub start_date: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub commitment_amount: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub overage_factor: Option<Decimal>,
    pub line_items: Option<serde_json::Value>,
    pub credit_grants: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    #[serde(default)]
    pub end_behavior: EndBehavior,
    pub phases: Vec<SchedulePhaseInput>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleResponse {
    #[serde(flatten)]
    pub schedule: subscription_schedule::Model,
    pub phases: Vec<subscription_schedule_phase::Model>,
}

#[derive(Clone)]
pub struct SubscriptionService {
    db: Arc<DatabaseConnection>,
    invoices: InvoiceService,
    wallets: WalletService,
}

impl SubscriptionService {
    pub fn new(db: Arc<DatabaseConnection>, invoices: InvoiceService, wallets: WalletService) -> Self {
        Self {
            db,
            invoices,
            wallets,
        }
    }

    /// Creates the subscription with line items copied from the matching
    /// plan prices and applies the plan's credit grants.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, customer_id = %req.customer_id, plan_id = %req.plan_id))]
    pub async fn create_subscription(
        &self,
        scope: &TenantScope,
        req: CreateSubscriptionRequest,
    ) -> RepositoryResult<SubscriptionResponse> {
        scope.validate()?;
        let code = currency::normalize(&req.currency)?;
        validate_period_count(req.billing_period_count)?;
        if req.trial_days.is_some_and(|days| days > MAX_TRIAL_DAYS) {
            return Err(RepositoryError::validation_error(format!(
                "trial_days must be at most {MAX_TRIAL_DAYS}"
            )));
        }

        let txn = self.db.begin().await?;
        CustomerRepository::new(&txn, scope)
            .get(&req.customer_id)
            .await?;
        let plan = PlanRepository::new(&txn, scope).get(&req.plan_id).await?;

        let prices: Vec<_> = PriceRepository::new(&txn, scope)
            .list_by_plan(&plan.id)
            .await?
            .into_iter()
            .filter(|price| {
                price.currency == code
                    && price.billing_period == req.billing_period
                    && price.billing_period_count == req.billing_period_count
            })
            .collect();
        if prices.is_empty() {
            return Err(RepositoryError::validation_error(format!(
                "plan {} has no {code} prices billed every {} {:?}",
                plan.id, req.billing_period_count, req.billing_period
            )));
        }

        let start = req.start_date.unwrap_or_else(Utc::now);
        if req.end_date.is_some_and(|end| end <= start) {
            return Err(RepositoryError::validation_error(
                "end_date must be after start_date",
            ));
        }
        let anchor = req.billing_anchor.unwrap_or(start);
        let (status, trial_end) = match req.trial_days {
            Some(days) if days > 0 => (
                SubscriptionStatus::Trialing,
                Some(add_days(start, i64::from(days))?),
            ),
            _ => (SubscriptionStatus::Active, None),
        };
        let period_start = trial_end.unwrap_or(start);
        let period_end =
            period_end_for(period_start, anchor, req.billing_period, req.billing_period_count)?;

        let now = now();
        let subscription = subscription::Model {
            id: ids::generate(ids::SUBSCRIPTION),
            tenant_id: scope.tenant_id.clone(),
            environment_id: scope.environment_id.clone(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: scope.actor(),
            updated_by: scope.actor(),
            lookup_key: req.lookup_key,
            customer_id: req.customer_id,
            plan_id: plan.id.clone(),
            subscription_status: status,
            currency: code,
            billing_anchor: anchor.into(),
            start_date: start.into(),
            end_date: req.end_date.map(Into::into),
            current_period_start: period_start.into(),
            current_period_end: period_end.into(),
            cancelled_at: None,
            cancel_at: None,
            cancel_at_period_end: false,
            trial_start: trial_end.map(|_| start.into()),
            trial_end: trial_end.map(Into::into),
            billing_cadence: req.billing_cadence,
            billing_period: req.billing_period,
            billing_period_count: req.billing_period_count,
            version: 1,
            metadata: req.metadata,
        };

        let meters = MeterRepository::new(&txn, scope);
        let mut line_items = Vec::with_capacity(prices.len());
        for price in prices {
            let meter_display_name = match &price.meter_id {
                Some(meter_id) => match meters.get(meter_id).await {
                    Ok(meter) => Some(meter.name),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                },
                None => None,
            };
            line_items.push(subscription_line_item::Model {
                id: ids::generate(ids::SUBSCRIPTION_LINE_ITEM),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                subscription_id: subscription.id.clone(),
                customer_id: subscription.customer_id.clone(),
                plan_id: Some(plan.id.clone()),
                plan_display_name: Some(plan.name.clone()),
                price_id: price.id.clone(),
                price_type: price.price_type,
                meter_id: price.meter_id.clone(),
                meter_display_name,
                display_name: price.description.clone().or_else(|| Some(plan.name.clone())),
                quantity: match price.price_type {
                    PriceType::Fixed => Decimal::ONE,
                    PriceType::Usage => Decimal::ZERO,
                },
                currency: price.currency.clone(),
                billing_period: price.billing_period,
                invoice_cadence: price.invoice_cadence,
                start_date: Some(subscription.start_date),
                end_date: None,
                metadata: None,
            });
        }

        let (subscription, line_items) = SubscriptionRepository::new(&txn, scope)
            .create_with_line_items(subscription, line_items)
            .await?;

        let grants = CreditGrantRepository::new(&txn, scope)
            .list_for_plan(&plan.id)
            .await?;
        for grant in &grants {
            self.apply_credit_grant(&txn, scope, &subscription, grant)
                .await?;
        }

        txn.commit().await?;
        info!(
            subscription_id = %subscription.id,
            status = ?subscription.subscription_status,
            line_items = line_items.len(),
            credit_grants = grants.len(),
            "Subscription created"
        );
        Ok(SubscriptionResponse {
            subscription,
            line_items,
        })
    }

    /// Credits the grant to the customer's wallet in the subscription
    /// currency, opening the wallet when there is none.
    async fn apply_credit_grant<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        subscription: &subscription::Model,
        grant: &credit_grant::Model,
    ) -> RepositoryResult<()> {
        if grant.currency != subscription.currency {
            debug!(
                grant_id = %grant.id,
                grant_currency = %grant.currency,
                "Skipping credit grant in another currency"
            );
            return Ok(());
        }

        let wallet = match WalletRepository::new(db, scope)
            .find_active(&subscription.customer_id, &subscription.currency)
            .await?
        {
            Some(wallet) => wallet,
            None => {
                self.wallets
                    .create_wallet_in(
                        db,
                        scope,
                        CreateWalletRequest {
                            customer_id: subscription.customer_id.clone(),
                            currency: subscription.currency.clone(),
                            name: Some("Prepaid credits".to_string()),
                            description: None,
                            conversion_rate: None,
                            initial_credits: None,
                            metadata: None,
                        },
                    )
                    .await?
            }
        };

        let mut params = CreditParams::new(grant.credits, TransactionReason::SubscriptionCreditGrant);
        params.expiry_date = match grant.expiration_days.filter(|days| *days > 0) {
            Some(days) => Some(add_days(Utc::now(), i64::from(days))?),
            None => None,
        };
        params.idempotency_key = Some(format!("{}:{}", subscription.id, grant.id));
        params.description = Some(grant.name.clone());
        params.priority = grant.priority;
        params.reference_type = Some("SUBSCRIPTION".to_string());
        params.reference_id = Some(subscription.id.clone());
        self.wallets
            .credit_in(db, scope, &wallet.id, params)
            .await?;
        Ok(())
    }

    pub async fn get_subscription(
        &self,
        scope: &TenantScope,
        id: &str,
    ) -> RepositoryResult<SubscriptionResponse> {
        let repo = SubscriptionRepository::new(self.db.as_ref(), scope);
        let subscription = repo.get(id).await?;
        let line_items = repo.line_items(id).await?;
        Ok(SubscriptionResponse {
            subscription,
            line_items,
        })
    }

    pub async fn list_subscriptions(
        &self,
        scope: &TenantScope,
        query: &SubscriptionQuery,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<subscription::Model>> {
        SubscriptionRepository::new(self.db.as_ref(), scope)
            .list(query, page)
            .await
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, subscription_id = %id))]
    pub async fn cancel(
        &self,
        scope: &TenantScope,
        id: &str,
        at_period_end: bool,
    ) -> RepositoryResult<subscription::Model> {
        let subscription = self
            .cancel_in(self.db.as_ref(), scope, id, at_period_end)
            .await?;
        info!(
            subscription_id = %subscription.id,
            at_period_end,
            "Cancelled subscription"
        );
        Ok(subscription)
    }

    async fn cancel_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        id: &str,
        at_period_end: bool,
    ) -> RepositoryResult<subscription::Model> {
        let repo = SubscriptionRepository::new(db, scope);
        let subscription = repo.get(id).await?;
        if subscription.subscription_status == SubscriptionStatus::Cancelled {
            return Err(RepositoryError::invalid_operation(
                "subscription is already cancelled",
            ));
        }

        let version = subscription.version;
        let period_end = subscription.current_period_end;
        let mut model = subscription.into_active_model();
        if at_period_end {
            model.cancel_at_period_end = Set(true);
            model.cancel_at = Set(Some(period_end));
        } else {
            let now = now();
            model.subscription_status = Set(SubscriptionStatus::Cancelled);
            model.cancelled_at = Set(Some(now));
            model.end_date = Set(Some(now));
            model.cancel_at_period_end = Set(false);
        }
        repo.update(model, version).await
    }

    pub async fn pause(&self, scope: &TenantScope, id: &str) -> RepositoryResult<subscription::Model> {
        self.transition(scope, id, SubscriptionStatus::Active, SubscriptionStatus::Paused)
            .await
    }

    pub async fn resume(&self, scope: &TenantScope, id: &str) -> RepositoryResult<subscription::Model> {
        self.transition(scope, id, SubscriptionStatus::Paused, SubscriptionStatus::Active)
            .await
    }

    async fn transition(
        &self,
        scope: &TenantScope,
        id: &str,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> RepositoryResult<subscription::Model> {
        let repo = SubscriptionRepository::new(self.db.as_ref(), scope);
        let subscription = repo.get(id).await?;
        if subscription.subscription_status != from {
            return Err(RepositoryError::invalid_operation(format!(
                "subscription is {:?}, expected {from:?}",
                subscription.subscription_status
            )));
        }
        let version = subscription.version;
        let mut model = subscription.into_active_model();
        model.subscription_status = Set(to);
        let subscription = repo.update(model, version).await?;
        info!(subscription_id = %subscription.id, status = ?to, "Subscription status changed");
        Ok(subscription)
    }

    /// Builds the invoice request for `[period_start, period_end)` from the
    /// subscription line items. Usage is keyed by meter id; missing usage
    /// counts as zero.
    pub async fn prepare_invoice_request<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &TenantScope,
        subscription: &subscription::Model,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        usage: &HashMap<String, Decimal>,
    ) -> RepositoryResult<CreateInvoiceRequest> {
        let items = SubscriptionRepository::new(db, scope)
            .line_items(&subscription.id)
            .await?;
        let price_ids: Vec<String> = items.iter().map(|item| item.price_id.clone()).collect();
        let prices: HashMap<String, _> = PriceRepository::new(db, scope)
            .list_by_ids(&price_ids)
            .await?
            .into_iter()
            .map(|price| (price.id.clone(), price))
            .collect();

        let mut line_items = Vec::with_capacity(items.len());
        for item in items {
            if item
                .end_date
                .is_some_and(|end| to_utc(end) <= period_start)
            {
                continue;
            }
            let price = prices
                .get(&item.price_id)
                .ok_or_else(|| RepositoryError::not_found("price", &item.price_id))?;

            let quantity = match item.price_type {
                PriceType::Fixed => item.quantity,
                PriceType::Usage => item
                    .meter_id
                    .as_ref()
                    .and_then(|meter_id| usage.get(meter_id))
                    .copied()
                    .unwrap_or_default(),
            };
            let amount = calculate_cost(price, quantity)?;

            line_items.push(CreateInvoiceLineItem {
                price_id: Some(item.price_id),
                price_type: Some(item.price_type),
                plan_id: item.plan_id,
                plan_display_name: item.plan_display_name,
                meter_id: item.meter_id,
                meter_display_name: item.meter_display_name,
                display_name: item.display_name,
                amount,
                quantity,
                period_start: Some(period_start),
                period_end: Some(period_end),
                metadata: None,
            });
        }

        let amount_due = checked_total(line_items.iter().map(|item| item.amount))?;
        Ok(CreateInvoiceRequest {
            customer_id: subscription.customer_id.clone(),
            subscription_id: Some(subscription.id.clone()),
            invoice_type: InvoiceType::Subscription,
            currency: subscription.currency.clone(),
            amount_due: Some(amount_due),
            description: Some(format!("Invoice for subscription {}", subscription.id)),
            billing_period: Some(subscription.billing_period),
            period_start: Some(period_start),
            period_end: Some(period_end),
            line_items,
            ..Default::default()
        })
    }

    /// Issues the invoice for an explicit period of the subscription.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, subscription_id = %id))]
    pub async fn create_subscription_invoice(
        &self,
        scope: &TenantScope,
        id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        usage: &HashMap<String, Decimal>,
    ) -> RepositoryResult<InvoiceResponse> {
        let txn = self.db.begin().await?;
        let subscription = SubscriptionRepository::new(&txn, scope).get(id).await?;
        let request = self
            .prepare_invoice_request(&txn, scope, &subscription, period_start, period_end, usage)
            .await?;
        let invoice = self.invoices.create_invoice_in(&txn, scope, request).await?;
        txn.commit().await?;
        Ok(invoice)
    }

    /// The invoice the current period would produce, without writing it.
    pub async fn preview_invoice(
        &self,
        scope: &TenantScope,
        id: &str,
        usage: &HashMap<String, Decimal>,
    ) -> RepositoryResult<CreateInvoiceRequest> {
        let db = self.db.as_ref();
        let subscription = SubscriptionRepository::new(db, scope).get(id).await?;
        self.prepare_invoice_request(
            db,
            scope,
            &subscription,
            to_utc(subscription.current_period_start),
            to_utc(subscription.current_period_end),
            usage,
        )
        .await
    }

    /// Invoices the current period and moves the subscription to the next
    /// one, or cancels it when cancellation at period end was requested.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, subscription_id = %id))]
    pub async fn renew(
        &self,
        scope: &TenantScope,
        id: &str,
        usage: &HashMap<String, Decimal>,
    ) -> RepositoryResult<RenewResponse> {
        let txn = self.db.begin().await?;
        let repo = SubscriptionRepository::new(&txn, scope);
        let subscription = repo.get(id).await?;

        let renewable = match subscription.subscription_status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Trialing => subscription
                .trial_end
                .is_some_and(|trial_end| to_utc(trial_end) <= Utc::now()),
            _ => false,
        };
        if !renewable {
            return Err(RepositoryError::invalid_operation(format!(
                "subscription is {:?} and cannot be renewed",
                subscription.subscription_status
            )));
        }

        let period_start = to_utc(subscription.current_period_start);
        let period_end = to_utc(subscription.current_period_end);
        let request = self
            .prepare_invoice_request(&txn, scope, &subscription, period_start, period_end, usage)
            .await?;
        let invoice = self.invoices.create_invoice_in(&txn, scope, request).await?;

        let version = subscription.version;
        let cancel_now = subscription.cancel_at_period_end;
        let next_end = period_end_for(
            period_end,
            to_utc(subscription.billing_anchor),
            subscription.billing_period,
            subscription.billing_period_count,
        )?;
        let mut model = subscription.into_active_model();
        if cancel_now {
            model.subscription_status = Set(SubscriptionStatus::Cancelled);
            model.cancelled_at = Set(Some(now()));
            model.end_date = Set(Some(period_end.into()));
        } else {
            model.subscription_status = Set(SubscriptionStatus::Active);
            model.current_period_start = Set(period_end.into());
            model.current_period_end = Set(next_end.into());
        }
        let subscription = repo.update(model, version).await?;
        txn.commit().await?;

        info!(
            subscription_id = %subscription.id,
            invoice_id = %invoice.invoice.id,
            status = ?subscription.subscription_status,
            "Renewed subscription"
        );
        Ok(RenewResponse {
            subscription,
            invoice,
        })
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, subscription_id = %subscription_id))]
    pub async fn create_schedule(
        &self,
        scope: &TenantScope,
        subscription_id: &str,
        req: CreateScheduleRequest,
    ) -> RepositoryResult<ScheduleResponse> {
        validate_phases(&req.phases)?;

        let txn = self.db.begin().await?;
        let subscription = SubscriptionRepository::new(&txn, scope)
            .get(subscription_id)
            .await?;
        if subscription.subscription_status == SubscriptionStatus::Cancelled {
            return Err(RepositoryError::invalid_operation(
                "cannot schedule a cancelled subscription",
            ));
        }
        let repo = SubscriptionScheduleRepository::new(&txn, scope);
        let has_active = repo
            .list_for_subscription(subscription_id)
            .await?
            .iter()
            .any(|schedule| schedule.schedule_status == ScheduleStatus::Active);
        if has_active {
            return Err(RepositoryError::invalid_operation(
                "subscription already has an active schedule",
            ));
        }

        let now = now();
        let schedule = subscription_schedule::Model {
            id: ids::generate(ids::SUBSCRIPTION_SCHEDULE),
            tenant_id: scope.tenant_id.clone(),
            environment_id: scope.environment_id.clone(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: scope.actor(),
            updated_by: scope.actor(),
            subscription_id: subscription.id,
            schedule_status: ScheduleStatus::Active,
            current_phase_index: 0,
            end_behavior: req.end_behavior,
            start_date: req.phases[0].start_date.into(),
            metadata: req.metadata,
        };
        let phases: Vec<_> = req
            .phases
            .into_iter()
            .enumerate()
            .map(|(index, phase)| subscription_schedule_phase::Model {
                id: ids::generate(ids::SUBSCRIPTION_SCHEDULE_PHASE),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                schedule_id: schedule.id.clone(),
                phase_index: index as i32,
                start_date: phase.start_date.into(),
                end_date: phase.end_date.map(Into::into),
                commitment_amount: phase.commitment_amount,
                overage_factor: phase.overage_factor,
                line_items: phase.line_items,
                credit_grants: phase.credit_grants,
                metadata: phase.metadata,
            })
            .collect();

        let schedule = repo.create_with_phases(schedule, phases).await?;
        let phases = repo.phases(&schedule.id).await?;
        txn.commit().await?;
        Ok(ScheduleResponse { schedule, phases })
    }

    pub async fn get_schedule(
        &self,
        scope: &TenantScope,
        schedule_id: &str,
    ) -> RepositoryResult<ScheduleResponse> {
        let repo = SubscriptionScheduleRepository::new(self.db.as_ref(), scope);
        let schedule = repo.get(schedule_id).await?;
        let phases = repo.phases(schedule_id).await?;
        Ok(ScheduleResponse { schedule, phases })
    }

    pub async fn list_schedules(
        &self,
        scope: &TenantScope,
        subscription_id: &str,
    ) -> RepositoryResult<Vec<subscription_schedule::Model>> {
        SubscriptionRepository::new(self.db.as_ref(), scope)
            .get(subscription_id)
            .await?;
        SubscriptionScheduleRepository::new(self.db.as_ref(), scope)
            .list_for_subscription(subscription_id)
            .await
    }

    /// Moves to the next phase. Past the last phase the schedule completes,
    /// and with end behavior `CANCEL` the subscription is cancelled too.
    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, schedule_id = %schedule_id))]
    pub async fn advance_schedule(
        &self,
        scope: &TenantScope,
        schedule_id: &str,
    ) -> RepositoryResult<ScheduleResponse> {
        let txn = self.db.begin().await?;
        let repo = SubscriptionScheduleRepository::new(&txn, scope);
        let schedule = repo.get(schedule_id).await?;
        if schedule.schedule_status != ScheduleStatus::Active {
            return Err(RepositoryError::invalid_operation(format!(
                "schedule is {:?}",
                schedule.schedule_status
            )));
        }
        let phases = repo.phases(schedule_id).await?;

        let next_index = schedule.current_phase_index + 1;
        let completes = next_index as usize >= phases.len();
        let end_behavior = schedule.end_behavior;
        let subscription_id = schedule.subscription_id.clone();

        let mut model = schedule.into_active_model();
        if completes {
            model.schedule_status = Set(ScheduleStatus::Completed);
        } else {
            model.current_phase_index = Set(next_index);
        }
        let schedule = repo.update(model).await?;

        if completes && end_behavior == EndBehavior::Cancel {
            let subscription = SubscriptionRepository::new(&txn, scope)
                .get(&subscription_id)
                .await?;
            if subscription.subscription_status != SubscriptionStatus::Cancelled {
                self.cancel_in(&txn, scope, &subscription_id, false).await?;
            }
        }
        txn.commit().await?;

        info!(
            schedule_id = %schedule.id,
            current_phase_index = schedule.current_phase_index,
            status = ?schedule.schedule_status,
            "Advanced subscription schedule"
        );
        Ok(ScheduleResponse { schedule, phases })
    }
}

/// Phases must be non-empty, ordered and contiguous; only the last one may
/// be open-ended.
fn validate_phases(phases: &[SchedulePhaseInput]) -> RepositoryResult<()> {
    if phases.is_empty() {
        return Err(RepositoryError::validation_error(
            "a schedule needs at least one phase",
        ));
    }
    for (index, phase) in phases.iter().enumerate() {
        if phase.end_date.is_some_and(|end| end <= phase.start_date) {
            return Err(RepositoryError::validation_error(format!(
                "phase {index} ends before it starts"
            )));
        }
        if let Some(next) = phases.get(index + 1) {
            match phase.end_date {
                Some(end) if end == next.start_date => {}
                Some(_) => {
                    return Err(RepositoryError::validation_error(format!(
                        "phase {} must start when phase {index} ends",
                        index + 1
                    )));
                }
                None => {
                    return Err(RepositoryError::validation_error(
                        "only the last phase may be open-ended",
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn phase(start: u32, end: Option<u32>) -> SchedulePhaseInput {
        let day = |d| Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap();
        SchedulePhaseInput {
            start_date: day(start),
            end_date: end.map(day),
            commitment_amount: None,
            overage_factor: None,
            line_items: None,
            credit_grants: None,
            metadata: None,
        }
    }

    #[test]
    fn contiguous_phases_are_accepted() {
        assert!(validate_phases(&[phase(1, Some(10)), phase(10, Some(20)), phase(20, None)]).is_ok());
    }

    #[test]
    fn gaps_overlaps_and_open_middles_are_rejected() {
        assert!(validate_phases(&[]).is_err());
        assert!(validate_phases(&[phase(1, Some(10)), phase(11, None)]).is_err());
        assert!(validate_phases(&[phase(1, Some(10)), phase(5, None)]).is_err());
        assert!(validate_phases(&[phase(1, None), phase(10, None)]).is_err());
        assert!(validate_phases(&[phase(10, Some(5))]).is_err());
    }
}
