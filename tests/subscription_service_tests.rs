//! Subscription service tests: creation from plan prices, credit grants,
//! renewal with usage, cancellation, pause/resume and schedules.

use std::collections::HashMap;

use anyhow::Result;
use billing::error::RepositoryError;
use billing::models::credit_grant::GrantScope;
use billing::models::invoice::{BillingReason, InvoiceStatus, InvoiceType};
use billing::models::subscription::SubscriptionStatus;
use billing::models::subscription_schedule::{EndBehavior, ScheduleStatus};
use billing::models::wallet_transaction::TransactionReason;
use billing::models::{meter, plan};
use billing::repositories::credit_grant::NewCreditGrant;
use billing::repositories::subscription::SubscriptionQuery;
use billing::repositories::CreditGrantRepository;
use billing::server::AppState;
use billing::services::subscription::{
    CreateScheduleRequest, CreateSubscriptionRequest, MAX_TRIAL_DAYS, SchedulePhaseInput,
};
use billing::types::{BillingPeriod, Pagination, PriceType, TenantScope};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{
    create_customer, create_meter, create_plan, create_price, fixed_price, scope, setup_state,
    usage_price,
};

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// A plan billing $20 a month plus $0.5 per API call, with a euro price
/// that USD subscriptions must ignore.
async fn priced_plan(state: &AppState, scope: &TenantScope) -> Result<(plan::Model, meter::Model)> {
    let plan = create_plan(&state.db, scope, "growth").await?;
    let meter = create_meter(&state.db, scope, "api.call").await?;
    create_price(&state.db, scope, fixed_price(&plan.id, dec!(20), "usd")).await?;
    create_price(
        &state.db,
        scope,
        usage_price(&plan.id, &meter.id, dec!(0.5), "usd"),
    )
    .await?;
    create_price(&state.db, scope, fixed_price(&plan.id, dec!(18), "eur")).await?;
    Ok((plan, meter))
}

fn subscribe(customer_id: &str, plan_id: &str) -> CreateSubscriptionRequest {
    CreateSubscriptionRequest {
        customer_id: customer_id.to_string(),
        plan_id: plan_id.to_string(),
        currency: "USD".into(),
        billing_period: BillingPeriod::Monthly,
        billing_period_count: 1,
        billing_cadence: Default::default(),
        start_date: Some(at(2025, 1, 15)),
        end_date: None,
        billing_anchor: None,
        trial_days: None,
        lookup_key: None,
        metadata: None,
    }
}

fn phase(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> SchedulePhaseInput {
    SchedulePhaseInput {
        start_date: start,
        end_date: end,
        commitment_amount: None,
        overage_factor: None,
        line_items: None,
        credit_grants: None,
        metadata: None,
    }
}

#[tokio::test]
async fn subscription_copies_matching_prices_into_line_items() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-create").await?;
    let (plan, meter) = priced_plan(&state, &scope).await?;

    let created = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?;
    let subscription = &created.subscription;

    assert!(subscription.id.starts_with("subs_"));
    assert_eq!(subscription.subscription_status, SubscriptionStatus::Active);
    assert_eq!(subscription.currency, "usd");
    assert_eq!(subscription.current_period_start, at(2025, 1, 15));
    assert_eq!(subscription.current_period_end, at(2025, 2, 15));
    assert_eq!(subscription.billing_anchor, at(2025, 1, 15));

    assert_eq!(created.line_items.len(), 2);
    let fixed = created
        .line_items
        .iter()
        .find(|item| item.price_type == PriceType::Fixed)
        .expect("fixed line item");
    assert_eq!(fixed.quantity, dec!(1));
    let usage = created
        .line_items
        .iter()
        .find(|item| item.price_type == PriceType::Usage)
        .expect("usage line item");
    assert_eq!(usage.quantity, dec!(0));
    assert_eq!(usage.meter_id.as_deref(), Some(meter.id.as_str()));
    assert_eq!(usage.meter_display_name.as_deref(), Some("Meter api.call"));

    let fetched = state
        .subscriptions
        .get_subscription(&scope, &subscription.id)
        .await?;
    assert_eq!(fetched.line_items.len(), 2);

    let listed = state
        .subscriptions
        .list_subscriptions(
            &scope,
            &SubscriptionQuery {
                customer_id: Some(customer.id.clone()),
                ..Default::default()
            },
            &Pagination::default(),
        )
        .await?;
    assert_eq!(listed.pagination.total, 1);
    Ok(())
}

#[tokio::test]
async fn subscription_without_matching_prices_is_rejected() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-noprice").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;

    let mut gbp = subscribe(&customer.id, &plan.id);
    gbp.currency = "gbp".into();
    assert!(matches!(
        state.subscriptions.create_subscription(&scope, gbp).await,
        Err(RepositoryError::Validation(_))
    ));

    let mut annual = subscribe(&customer.id, &plan.id);
    annual.billing_period = BillingPeriod::Annual;
    assert!(matches!(
        state.subscriptions.create_subscription(&scope, annual).await,
        Err(RepositoryError::Validation(_))
    ));

    assert!(matches!(
        state
            .subscriptions
            .create_subscription(&scope, subscribe("cust_missing", &plan.id))
            .await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn plan_credit_grants_fund_a_wallet_in_the_subscription_currency() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-grants").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;
    let grants = CreditGrantRepository::new(state.db.as_ref(), &scope);
    let grant = |currency: &str, credits: Decimal| NewCreditGrant {
        name: format!("Welcome {currency}"),
        scope: GrantScope::Plan,
        plan_id: Some(plan.id.clone()),
        subscription_id: None,
        credits,
        currency: currency.to_string(),
        cadence: None,
        expiration_days: Some(30),
        priority: Some(1),
        metadata: None,
    };
    let usd_grant = grants.create(grant("usd", dec!(100))).await?;
    grants.create(grant("eur", dec!(80))).await?;

    let created = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?;

    let wallets = state
        .wallets
        .list_customer_wallets(&scope, &customer.id)
        .await?;
    assert_eq!(wallets.len(), 1);
    let wallet = &wallets[0];
    assert_eq!(wallet.currency, "usd");
    assert_eq!(wallet.credit_balance, dec!(100));

    let ledger = state
        .wallets
        .list_transactions(&scope, &wallet.id, &Pagination::default())
        .await?;
    assert_eq!(ledger.items.len(), 1);
    let credit = &ledger.items[0];
    assert_eq!(
        credit.transaction_reason,
        TransactionReason::SubscriptionCreditGrant
    );
    assert!(credit.expiry_date.is_some());
    assert_eq!(
        credit.idempotency_key.as_deref(),
        Some(format!("{}:{}", created.subscription.id, usd_grant.id).as_str())
    );
    Ok(())
}

#[tokio::test]
async fn out_of_range_inputs_are_validation_errors() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-bounds").await?;
    let (plan, meter) = priced_plan(&state, &scope).await?;

    let mut endless_trial = subscribe(&customer.id, &plan.id);
    endless_trial.trial_days = Some(u32::MAX);
    assert!(matches!(
        state.subscriptions.create_subscription(&scope, endless_trial).await,
        Err(RepositoryError::Validation(_))
    ));
    let mut longest_trial = subscribe(&customer.id, &plan.id);
    longest_trial.trial_days = Some(MAX_TRIAL_DAYS);
    let trialing = state
        .subscriptions
        .create_subscription(&scope, longest_trial)
        .await?;
    assert_eq!(
        trialing.subscription.subscription_status,
        SubscriptionStatus::Trialing
    );

    let mut many_periods = subscribe(&customer.id, &plan.id);
    many_periods.billing_period_count = i32::MAX;
    assert!(matches!(
        state.subscriptions.create_subscription(&scope, many_periods).await,
        Err(RepositoryError::Validation(_))
    ));

    assert!(matches!(
        CreditGrantRepository::new(state.db.as_ref(), &scope)
            .create(NewCreditGrant {
                name: "Forever".into(),
                scope: GrantScope::Plan,
                plan_id: Some(plan.id.clone()),
                subscription_id: None,
                credits: dec!(10),
                currency: "usd".into(),
                cadence: None,
                expiration_days: Some(i32::MAX),
                priority: None,
                metadata: None,
            })
            .await,
        Err(RepositoryError::Validation(_))
    ));

    // Usage large enough to overflow the charge leaves the period untouched.
    let bulk = create_plan(&state.db, &scope, "bulk").await?;
    create_price(
        &state.db,
        &scope,
        usage_price(&bulk.id, &meter.id, Decimal::from(10u64.pow(15)), "usd"),
    )
    .await?;
    let subscription = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &bulk.id))
        .await?
        .subscription;
    let usage = HashMap::from([(meter.id.clone(), Decimal::from(10u64.pow(18)))]);
    assert!(matches!(
        state
            .subscriptions
            .preview_invoice(&scope, &subscription.id, &usage)
            .await,
        Err(RepositoryError::Validation(_))
    ));
    assert!(matches!(
        state.subscriptions.renew(&scope, &subscription.id, &usage).await,
        Err(RepositoryError::Validation(_))
    ));
    let unchanged = state
        .subscriptions
        .get_subscription(&scope, &subscription.id)
        .await?
        .subscription;
    assert_eq!(unchanged.current_period_start, at(2025, 1, 15));
    assert_eq!(unchanged.version, subscription.version);
    Ok(())
}

#[tokio::test]
async fn trial_subscriptions_start_after_the_trial() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-trial").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;

    let mut request = subscribe(&customer.id, &plan.id);
    request.start_date = None;
    request.trial_days = Some(14);
    let subscription = state
        .subscriptions
        .create_subscription(&scope, request)
        .await?
        .subscription;

    assert_eq!(subscription.subscription_status, SubscriptionStatus::Trialing);
    let trial_end = subscription.trial_end.expect("trial end");
    assert_eq!(subscription.current_period_start, trial_end);
    assert_eq!((trial_end - subscription.start_date).num_days(), 14);

    // The trial has not ended yet.
    assert!(matches!(
        state
            .subscriptions
            .renew(&scope, &subscription.id, &HashMap::new())
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn renewal_invoices_usage_and_advances_the_period() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-renew").await?;
    let (plan, meter) = priced_plan(&state, &scope).await?;
    let subscription = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;

    let usage = HashMap::from([(meter.id.clone(), dec!(40))]);
    let preview = state
        .subscriptions
        .preview_invoice(&scope, &subscription.id, &usage)
        .await?;
    assert_eq!(preview.amount_due, Some(dec!(40)));
    assert_eq!(preview.line_items.len(), 2);

    let renewed = state
        .subscriptions
        .renew(&scope, &subscription.id, &usage)
        .await?;
    let invoice = &renewed.invoice.invoice;
    assert_eq!(invoice.invoice_type, InvoiceType::Subscription);
    assert_eq!(invoice.invoice_status, InvoiceStatus::Draft);
    assert_eq!(invoice.amount_due, dec!(40));
    assert_eq!(invoice.period_start, Some(at(2025, 1, 15).into()));
    assert_eq!(invoice.period_end, Some(at(2025, 2, 15).into()));
    assert_eq!(invoice.billing_reason, Some(BillingReason::SubscriptionCreate));
    let usage_item = renewed
        .invoice
        .line_items
        .iter()
        .find(|item| item.price_type == Some(PriceType::Usage))
        .expect("usage line");
    assert_eq!(usage_item.quantity, dec!(40));
    assert_eq!(usage_item.amount, dec!(20));

    assert_eq!(renewed.subscription.current_period_start, at(2025, 2, 15));
    assert_eq!(renewed.subscription.current_period_end, at(2025, 3, 15));
    assert_eq!(renewed.subscription.version, subscription.version + 1);

    // No usage reported bills only the fixed fee.
    let second = state
        .subscriptions
        .renew(&scope, &subscription.id, &HashMap::new())
        .await?;
    assert_eq!(second.invoice.invoice.amount_due, dec!(20));
    assert_eq!(second.invoice.invoice.billing_sequence, Some(2));
    assert_eq!(
        second.invoice.invoice.billing_reason,
        Some(BillingReason::SubscriptionCycle)
    );

    // Invoicing an already billed period returns the existing invoice.
    let again = state
        .subscriptions
        .create_subscription_invoice(
            &scope,
            &subscription.id,
            at(2025, 1, 15),
            at(2025, 2, 15),
            &HashMap::new(),
        )
        .await?;
    assert_eq!(again.invoice.id, invoice.id);
    assert_eq!(again.invoice.amount_due, dec!(40));
    Ok(())
}

#[tokio::test]
async fn voided_period_invoice_can_be_billed_again() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-rebill").await?;
    let (plan, meter) = priced_plan(&state, &scope).await?;
    let subscription = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;

    let first = state
        .subscriptions
        .create_subscription_invoice(
            &scope,
            &subscription.id,
            at(2025, 1, 15),
            at(2025, 2, 15),
            &HashMap::from([(meter.id.clone(), dec!(40))]),
        )
        .await?;
    assert_eq!(first.invoice.amount_due, dec!(40));
    state.invoices.void_invoice(&scope, &first.invoice.id).await?;

    let rebilled = state
        .subscriptions
        .create_subscription_invoice(
            &scope,
            &subscription.id,
            at(2025, 1, 15),
            at(2025, 2, 15),
            &HashMap::from([(meter.id.clone(), dec!(10))]),
        )
        .await?;
    assert_ne!(rebilled.invoice.id, first.invoice.id);
    assert_eq!(rebilled.invoice.invoice_status, InvoiceStatus::Draft);
    assert_eq!(rebilled.invoice.amount_due, dec!(25));
    assert_eq!(rebilled.invoice.idempotency_key, first.invoice.idempotency_key);

    // The replacement now holds the period.
    let again = state
        .subscriptions
        .create_subscription_invoice(
            &scope,
            &subscription.id,
            at(2025, 1, 15),
            at(2025, 2, 15),
            &HashMap::new(),
        )
        .await?;
    assert_eq!(again.invoice.id, rebilled.invoice.id);
    Ok(())
}

#[tokio::test]
async fn cancellation_now_or_at_period_end() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-cancel").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;

    let immediate = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;
    let cancelled = state
        .subscriptions
        .cancel(&scope, &immediate.id, false)
        .await?;
    assert_eq!(cancelled.subscription_status, SubscriptionStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert!(cancelled.end_date.is_some());
    assert!(matches!(
        state.subscriptions.cancel(&scope, &immediate.id, false).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    assert!(matches!(
        state
            .subscriptions
            .renew(&scope, &immediate.id, &HashMap::new())
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    let deferred = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;
    let pending = state
        .subscriptions
        .cancel(&scope, &deferred.id, true)
        .await?;
    assert_eq!(pending.subscription_status, SubscriptionStatus::Active);
    assert!(pending.cancel_at_period_end);
    assert_eq!(pending.cancel_at, Some(pending.current_period_end));

    let renewed = state
        .subscriptions
        .renew(&scope, &deferred.id, &HashMap::new())
        .await?;
    assert_eq!(
        renewed.subscription.subscription_status,
        SubscriptionStatus::Cancelled
    );
    assert_eq!(renewed.subscription.end_date, Some(at(2025, 2, 15).into()));
    assert_eq!(renewed.invoice.invoice.amount_due, dec!(20));
    Ok(())
}

#[tokio::test]
async fn pause_and_resume_only_from_the_expected_state() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-pause").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;
    let subscription = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;

    assert!(matches!(
        state.subscriptions.resume(&scope, &subscription.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    let paused = state.subscriptions.pause(&scope, &subscription.id).await?;
    assert_eq!(paused.subscription_status, SubscriptionStatus::Paused);
    assert!(matches!(
        state.subscriptions.pause(&scope, &subscription.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    assert!(matches!(
        state
            .subscriptions
            .renew(&scope, &subscription.id, &HashMap::new())
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    let resumed = state.subscriptions.resume(&scope, &subscription.id).await?;
    assert_eq!(resumed.subscription_status, SubscriptionStatus::Active);
    Ok(())
}

#[tokio::test]
async fn schedules_walk_phases_and_can_cancel_at_the_end() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs-schedule").await?;
    let (plan, _) = priced_plan(&state, &scope).await?;
    let subscription = state
        .subscriptions
        .create_subscription(&scope, subscribe(&customer.id, &plan.id))
        .await?
        .subscription;

    let gap = CreateScheduleRequest {
        end_behavior: EndBehavior::Cancel,
        phases: vec![
            phase(at(2025, 1, 15), Some(at(2025, 4, 15))),
            phase(at(2025, 5, 15), None),
        ],
        metadata: None,
    };
    assert!(matches!(
        state
            .subscriptions
            .create_schedule(&scope, &subscription.id, gap)
            .await,
        Err(RepositoryError::Validation(_))
    ));

    let request = || CreateScheduleRequest {
        end_behavior: EndBehavior::Cancel,
        phases: vec![
            phase(at(2025, 1, 15), Some(at(2025, 4, 15))),
            phase(at(2025, 4, 15), None),
        ],
        metadata: None,
    };
    let schedule = state
        .subscriptions
        .create_schedule(&scope, &subscription.id, request())
        .await?;
    assert_eq!(schedule.phases.len(), 2);
    assert_eq!(schedule.schedule.current_phase_index, 0);
    assert_eq!(schedule.schedule.schedule_status, ScheduleStatus::Active);
    assert!(matches!(
        state
            .subscriptions
            .create_schedule(&scope, &subscription.id, request())
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    let listed = state
        .subscriptions
        .list_schedules(&scope, &subscription.id)
        .await?;
    assert_eq!(listed.len(), 1);

    let second_phase = state
        .subscriptions
        .advance_schedule(&scope, &schedule.schedule.id)
        .await?;
    assert_eq!(second_phase.schedule.current_phase_index, 1);
    assert_eq!(second_phase.schedule.schedule_status, ScheduleStatus::Active);

    let done = state
        .subscriptions
        .advance_schedule(&scope, &schedule.schedule.id)
        .await?;
    assert_eq!(done.schedule.schedule_status, ScheduleStatus::Completed);
    let subscription = state
        .subscriptions
        .get_subscription(&scope, &subscription.id)
        .await?
        .subscription;
    assert_eq!(subscription.subscription_status, SubscriptionStatus::Cancelled);

    assert!(matches!(
        state
            .subscriptions
            .advance_schedule(&scope, &schedule.schedule.id)
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    Ok(())
}
