//! Invoice service tests: defaults, numbering, idempotency, subscription
//! periods and the payment status machine.

use anyhow::Result;
use billing::error::RepositoryError;
use billing::models::invoice::{BillingReason, InvoiceStatus, InvoiceType};
use billing::repositories::invoice::InvoiceQuery;
use billing::services::invoice::{
    CreateInvoiceLineItem, CreateInvoiceRequest, UpdatePaymentStatusRequest,
};
use billing::types::{Pagination, PaymentStatus, PriceType};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{create_customer, scope, setup_state};

fn one_off(customer_id: &str) -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        customer_id: customer_id.to_string(),
        invoice_type: InvoiceType::OneOff,
        currency: "USD".into(),
        line_items: vec![
            CreateInvoiceLineItem {
                display_name: Some("Setup".into()),
                amount: dec!(40),
                quantity: dec!(1),
                ..Default::default()
            },
            CreateInvoiceLineItem {
                display_name: Some("Seats".into()),
                amount: dec!(12.5),
                quantity: dec!(5),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn subscription_invoice(customer_id: &str, month: u32) -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        customer_id: customer_id.to_string(),
        subscription_id: Some("subs_fixture".into()),
        invoice_type: InvoiceType::Subscription,
        currency: "usd".into(),
        amount_due: Some(dec!(30)),
        period_start: Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0).single(),
        period_end: Utc.with_ymd_and_hms(2025, month + 1, 1, 0, 0, 0).single(),
        ..Default::default()
    }
}

#[tokio::test]
async fn one_off_invoice_is_finalized_and_paid_by_default() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "one-off").await?;

    let created = state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?;
    let invoice = &created.invoice;

    assert!(invoice.id.starts_with("inv_"));
    assert_eq!(invoice.currency, "usd");
    assert_eq!(invoice.invoice_status, InvoiceStatus::Finalized);
    assert_eq!(invoice.payment_status, PaymentStatus::Succeeded);
    assert_eq!(invoice.amount_due, dec!(52.5));
    assert_eq!(invoice.amount_paid, dec!(52.5));
    assert_eq!(invoice.amount_remaining, dec!(0));
    assert!(invoice.paid_at.is_some());
    assert!(invoice.finalized_at.is_some());
    assert!(invoice.due_date.is_some());
    assert_eq!(created.line_items.len(), 2);

    let number = invoice.invoice_number.as_deref().unwrap_or_default();
    let expected_prefix = format!("INV-{}-", Utc::now().format("%Y%m"));
    assert!(number.starts_with(&expected_prefix), "unexpected number {number}");
    assert_eq!(number.len(), expected_prefix.len() + 5);

    let fetched = state.invoices.get_invoice(&scope, &invoice.id).await?;
    assert_eq!(fetched.line_items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn invoice_numbers_increase_within_a_month() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "numbers").await?;

    let first = state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?;
    let second = state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?;

    let seq = |number: Option<String>| -> u32 {
        number
            .and_then(|n| n.rsplit('-').next().map(str::to_string))
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    };
    assert_eq!(seq(second.invoice.invoice_number), seq(first.invoice.invoice_number) + 1);
    Ok(())
}

#[tokio::test]
async fn explicit_idempotency_key_returns_the_first_invoice() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "idem").await?;
    let mut request = one_off(&customer.id);
    request.idempotency_key = Some("order-42".into());

    let first = state.invoices.create_invoice(&scope, request.clone()).await?;
    let second = state.invoices.create_invoice(&scope, request).await?;

    assert_eq!(first.invoice.id, second.invoice.id);
    assert_eq!(second.line_items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn voiding_releases_the_idempotency_key() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "reissue").await?;
    let mut request = subscription_invoice(&customer.id, 4);
    request.idempotency_key = Some("april-close".into());

    let first = state.invoices.create_invoice(&scope, request.clone()).await?.invoice;
    state.invoices.void_invoice(&scope, &first.id).await?;

    let reissued = state.invoices.create_invoice(&scope, request.clone()).await?.invoice;
    assert_ne!(reissued.id, first.id);
    assert_eq!(reissued.invoice_status, InvoiceStatus::Draft);
    assert_eq!(reissued.idempotency_key, first.idempotency_key);

    let again = state.invoices.create_invoice(&scope, request).await?.invoice;
    assert_eq!(again.id, reissued.id);
    Ok(())
}

#[tokio::test]
async fn subscription_invoices_start_as_drafts_and_count_sequences() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "subs").await?;

    let first = state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 1))
        .await?
        .invoice;
    assert_eq!(first.invoice_status, InvoiceStatus::Draft);
    assert_eq!(first.payment_status, PaymentStatus::Pending);
    assert_eq!(first.amount_paid, dec!(0));
    assert_eq!(first.amount_remaining, dec!(30));
    assert_eq!(first.billing_sequence, Some(1));
    assert_eq!(first.billing_reason, Some(BillingReason::SubscriptionCreate));

    // Same period without a key derives the same key and returns the same invoice.
    let retried = state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 1))
        .await?
        .invoice;
    assert_eq!(retried.id, first.id);

    let second = state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 2))
        .await?
        .invoice;
    assert_eq!(second.billing_sequence, Some(2));
    assert_eq!(second.billing_reason, Some(BillingReason::SubscriptionCycle));
    Ok(())
}

#[tokio::test]
async fn a_subscription_period_is_invoiced_once() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "period").await?;

    state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 3))
        .await?;

    let mut duplicate = subscription_invoice(&customer.id, 3);
    duplicate.idempotency_key = Some("different-key".into());
    let err = state
        .invoices
        .create_invoice(&scope, duplicate)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Constraint(_)));
    Ok(())
}

#[tokio::test]
async fn invalid_invoice_requests_are_rejected() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "invalid").await?;

    let mut missing_period = subscription_invoice(&customer.id, 4);
    missing_period.period_end = None;
    assert!(matches!(
        state.invoices.create_invoice(&scope, missing_period).await,
        Err(RepositoryError::Validation(_))
    ));

    let mut no_amount = one_off(&customer.id);
    no_amount.line_items.clear();
    assert!(matches!(
        state.invoices.create_invoice(&scope, no_amount).await,
        Err(RepositoryError::Validation(_))
    ));

    let mut overpaid = one_off(&customer.id);
    overpaid.amount_paid = Some(dec!(1000));
    assert!(matches!(
        state.invoices.create_invoice(&scope, overpaid).await,
        Err(RepositoryError::Validation(_))
    ));

    let mut bad_currency = one_off(&customer.id);
    bad_currency.currency = "dollars".into();
    assert!(matches!(
        state.invoices.create_invoice(&scope, bad_currency).await,
        Err(RepositoryError::Validation(_))
    ));

    assert!(matches!(
        state.invoices.create_invoice(&scope, one_off("cust_missing")).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn finalize_and_void_follow_the_lifecycle() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "lifecycle").await?;
    let draft = state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 5))
        .await?
        .invoice;

    let finalized = state.invoices.finalize_invoice(&scope, &draft.id).await?;
    assert_eq!(finalized.invoice_status, InvoiceStatus::Finalized);
    assert!(finalized.finalized_at.is_some());
    assert_eq!(finalized.version, draft.version + 1);
    assert!(matches!(
        state.invoices.finalize_invoice(&scope, &draft.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    let voided = state.invoices.void_invoice(&scope, &draft.id).await?;
    assert_eq!(voided.invoice_status, InvoiceStatus::Voided);
    assert!(voided.voided_at.is_some());
    assert!(matches!(
        state.invoices.void_invoice(&scope, &draft.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    let paid = state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?
        .invoice;
    assert!(matches!(
        state.invoices.void_invoice(&scope, &paid.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn payment_status_transitions_are_enforced() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "payments").await?;
    let invoice = state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 6))
        .await?
        .invoice;
    let update = |payment_status, amount| UpdatePaymentStatusRequest {
        payment_status,
        amount,
    };

    let partial = state
        .invoices
        .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Pending, Some(dec!(10))))
        .await?;
    assert_eq!(partial.amount_paid, dec!(10));
    assert_eq!(partial.amount_remaining, dec!(20));

    let failed = state
        .invoices
        .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Failed, None))
        .await?;
    assert_eq!(failed.amount_paid, dec!(0));
    assert_eq!(failed.amount_remaining, dec!(30));

    assert!(matches!(
        state
            .invoices
            .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Succeeded, None))
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    state
        .invoices
        .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Pending, None))
        .await?;
    let succeeded = state
        .invoices
        .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Succeeded, None))
        .await?;
    assert_eq!(succeeded.amount_paid, dec!(30));
    assert_eq!(succeeded.amount_remaining, dec!(0));
    assert!(succeeded.paid_at.is_some());

    assert!(matches!(
        state
            .invoices
            .update_payment_status(&scope, &invoice.id, update(PaymentStatus::Pending, None))
            .await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn customer_summary_splits_unpaid_charges() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "summary").await?;

    state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?;
    let mut overdue = subscription_invoice(&customer.id, 7);
    overdue.amount_due = None;
    overdue.due_date = Some(Utc::now() - Duration::days(3));
    overdue.line_items = vec![
        CreateInvoiceLineItem {
            price_type: Some(PriceType::Fixed),
            amount: dec!(20),
            quantity: dec!(1),
            ..Default::default()
        },
        CreateInvoiceLineItem {
            price_type: Some(PriceType::Usage),
            amount: dec!(7.5),
            quantity: dec!(150),
            ..Default::default()
        },
    ];
    state.invoices.create_invoice(&scope, overdue).await?;

    let mut euro = one_off(&customer.id);
    euro.currency = "eur".into();
    state.invoices.create_invoice(&scope, euro).await?;

    let summary = state
        .invoices
        .customer_invoice_summary(&scope, &customer.id, "USD")
        .await?;
    assert_eq!(summary.currency, "usd");
    assert_eq!(summary.total_invoice_count, 2);
    assert_eq!(summary.total_revenue_amount, dec!(80));
    assert_eq!(summary.unpaid_invoice_count, 1);
    assert_eq!(summary.total_unpaid_amount, dec!(27.5));
    assert_eq!(summary.overdue_invoice_count, 1);
    assert_eq!(summary.total_overdue_amount, dec!(27.5));
    assert_eq!(summary.unpaid_fixed_charges, dec!(20));
    assert_eq!(summary.unpaid_usage_charges, dec!(7.5));
    Ok(())
}

#[tokio::test]
async fn invoices_list_by_customer_and_status() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "listing").await?;
    let other = create_customer(&state.db, &scope, "listing-other").await?;

    state
        .invoices
        .create_invoice(&scope, one_off(&customer.id))
        .await?;
    state
        .invoices
        .create_invoice(&scope, subscription_invoice(&customer.id, 8))
        .await?;
    state
        .invoices
        .create_invoice(&scope, one_off(&other.id))
        .await?;

    let for_customer = state
        .invoices
        .list_invoices(
            &scope,
            &InvoiceQuery {
                customer_id: Some(customer.id.clone()),
                ..Default::default()
            },
            &Pagination::default(),
        )
        .await?;
    assert_eq!(for_customer.pagination.total, 2);

    let drafts = state
        .invoices
        .list_invoices(
            &scope,
            &InvoiceQuery {
                invoice_status: Some("DRAFT".into()),
                ..Default::default()
            },
            &Pagination::default(),
        )
        .await?;
    assert_eq!(drafts.items.len(), 1);
    assert_eq!(drafts.items[0].customer_id, customer.id);
    Ok(())
}
