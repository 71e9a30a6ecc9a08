//! Wallet service tests: the credit ledger, consumption order, expiry,
//! termination and real-time balance.

use anyhow::Result;
use billing::error::RepositoryError;
use billing::models::invoice::InvoiceType;
use billing::models::wallet::WalletStatus;
use billing::models::wallet_transaction::{TransactionReason, TransactionType};
use billing::repositories::WalletRepository;
use billing::services::invoice::CreateInvoiceRequest;
use billing::services::wallet::{CreateWalletRequest, DebitRequest, TopUpRequest, WalletService};
use billing::types::{Pagination, TenantScope};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{create_customer, scope, setup_state};

fn wallet_request(customer_id: &str, currency: &str) -> CreateWalletRequest {
    CreateWalletRequest {
        customer_id: customer_id.to_string(),
        currency: currency.to_string(),
        name: Some("Prepaid".into()),
        description: None,
        conversion_rate: None,
        initial_credits: None,
        metadata: None,
    }
}

fn credits(amount: Decimal) -> TopUpRequest {
    TopUpRequest {
        credits_to_add: Some(amount),
        ..Default::default()
    }
}

fn debit(amount: Decimal) -> DebitRequest {
    DebitRequest {
        credits: amount,
        transaction_reason: None,
        idempotency_key: None,
        description: None,
        metadata: None,
    }
}

#[tokio::test]
async fn wallet_creation_applies_initial_credits_and_conversion_rate() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-create").await?;

    let wallet = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                conversion_rate: Some(dec!(2)),
                initial_credits: Some(dec!(100)),
                ..wallet_request(&customer.id, "USD")
            },
        )
        .await?;
    assert!(wallet.id.starts_with("wallet_"));
    assert_eq!(wallet.currency, "usd");
    assert_eq!(wallet.wallet_status, WalletStatus::Active);
    assert_eq!(wallet.credit_balance, dec!(100));
    assert_eq!(wallet.balance, dec!(200));

    let ledger = state
        .wallets
        .list_transactions(&scope, &wallet.id, &Pagination::default())
        .await?;
    assert_eq!(ledger.items.len(), 1);
    assert_eq!(
        ledger.items[0].transaction_reason,
        TransactionReason::FreeCreditGrant
    );

    let duplicate = state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::InvalidOperation(_))));

    state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "eur"))
        .await?;
    assert_eq!(
        state
            .wallets
            .list_customer_wallets(&scope, &customer.id)
            .await?
            .len(),
        2
    );

    let bad_rate = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                conversion_rate: Some(dec!(0)),
                ..wallet_request(&customer.id, "gbp")
            },
        )
        .await;
    assert!(matches!(bad_rate, Err(RepositoryError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn top_up_converts_amounts_and_is_idempotent() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-topup").await?;
    let wallet = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                conversion_rate: Some(dec!(2)),
                ..wallet_request(&customer.id, "usd")
            },
        )
        .await?;

    let by_amount = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                amount: Some(dec!(50)),
                idempotency_key: Some("topup-1".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(by_amount.transaction_type, TransactionType::Credit);
    assert_eq!(by_amount.credit_amount, dec!(25));
    assert_eq!(by_amount.credit_balance_before, dec!(0));
    assert_eq!(by_amount.credit_balance_after, dec!(25));
    assert_eq!(
        by_amount.transaction_reason,
        TransactionReason::PurchasedCreditDirect
    );

    let replay = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                amount: Some(dec!(50)),
                idempotency_key: Some("topup-1".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(replay.id, by_amount.id);

    let wallet = state.wallets.get_wallet(&scope, &wallet.id).await?;
    assert_eq!(wallet.credit_balance, dec!(25));
    assert_eq!(wallet.balance, dec!(50));

    let neither = state
        .wallets
        .top_up(&scope, &wallet.id, TopUpRequest::default())
        .await;
    assert!(matches!(neither, Err(RepositoryError::Validation(_))));

    let debit_reason = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                transaction_reason: Some(TransactionReason::InvoicePayment),
                ..credits(dec!(5))
            },
        )
        .await;
    assert!(matches!(debit_reason, Err(RepositoryError::Validation(_))));

    let zero = state.wallets.top_up(&scope, &wallet.id, credits(dec!(0))).await;
    assert!(matches!(zero, Err(RepositoryError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn debits_consume_the_soonest_expiring_credits_first() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-order").await?;
    let wallet = state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await?;

    let later = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                expiry_date: Some(Utc::now() + Duration::days(10)),
                ..credits(dec!(10))
            },
        )
        .await?;
    let never = state
        .wallets
        .top_up(&scope, &wallet.id, credits(dec!(10)))
        .await?;
    let sooner = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                expiry_date: Some(Utc::now() + Duration::days(5)),
                ..credits(dec!(10))
            },
        )
        .await?;

    let spent = state.wallets.debit(&scope, &wallet.id, debit(dec!(15))).await?;
    assert_eq!(spent.transaction_type, TransactionType::Debit);
    assert_eq!(spent.credit_balance_before, dec!(30));
    assert_eq!(spent.credit_balance_after, dec!(15));
    assert_eq!(
        spent.transaction_reason,
        TransactionReason::ManualBalanceDebit
    );

    let repo = WalletRepository::new(state.db.as_ref(), &scope);
    assert_eq!(repo.get_transaction(&sooner.id).await?.credits_available, dec!(0));
    assert_eq!(repo.get_transaction(&later.id).await?.credits_available, dec!(5));
    assert_eq!(repo.get_transaction(&never.id).await?.credits_available, dec!(10));
    assert_eq!(repo.get(&wallet.id).await?.credit_balance, dec!(15));
    Ok(())
}

#[tokio::test]
async fn insufficient_balance_writes_nothing() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-short").await?;
    let wallet = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                initial_credits: Some(dec!(10)),
                ..wallet_request(&customer.id, "usd")
            },
        )
        .await?;

    let result = state.wallets.debit(&scope, &wallet.id, debit(dec!(10.5))).await;
    assert!(matches!(result, Err(RepositoryError::InvalidOperation(_))));

    let wallet = state.wallets.get_wallet(&scope, &wallet.id).await?;
    assert_eq!(wallet.credit_balance, dec!(10));
    let ledger = state
        .wallets
        .list_transactions(&scope, &wallet.id, &Pagination::default())
        .await?;
    assert_eq!(ledger.pagination.total, 1);

    let credit_reason = state
        .wallets
        .debit(
            &scope,
            &wallet.id,
            DebitRequest {
                transaction_reason: Some(TransactionReason::FreeCreditGrant),
                ..debit(dec!(1))
            },
        )
        .await;
    assert!(matches!(credit_reason, Err(RepositoryError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn expired_credits_are_skipped_and_can_be_expired() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-expiry").await?;
    let wallet = state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await?;

    let expired = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                expiry_date: Some(Utc::now() - Duration::days(1)),
                ..credits(dec!(20))
            },
        )
        .await?;
    let fresh = state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                expiry_date: Some(Utc::now() + Duration::days(30)),
                ..credits(dec!(5))
            },
        )
        .await?;

    // Only the unexpired five credits are spendable.
    let result = state.wallets.debit(&scope, &wallet.id, debit(dec!(6))).await;
    assert!(matches!(result, Err(RepositoryError::InvalidOperation(_))));

    let not_yet = state.wallets.expire_credits(&scope, &fresh.id).await;
    assert!(matches!(not_yet, Err(RepositoryError::InvalidOperation(_))));

    let expiry = state.wallets.expire_credits(&scope, &expired.id).await?;
    assert_eq!(expiry.transaction_type, TransactionType::Debit);
    assert_eq!(expiry.transaction_reason, TransactionReason::CreditExpired);
    assert_eq!(expiry.credit_amount, dec!(20));
    assert_eq!(expiry.reference_id.as_deref(), Some(expired.id.as_str()));

    let wallet = state.wallets.get_wallet(&scope, &wallet.id).await?;
    assert_eq!(wallet.credit_balance, dec!(5));

    let again = state.wallets.expire_credits(&scope, &expired.id).await;
    assert!(matches!(again, Err(RepositoryError::InvalidOperation(_))));

    let debit_row = state.wallets.expire_credits(&scope, &expiry.id).await;
    assert!(matches!(debit_row, Err(RepositoryError::InvalidOperation(_))));
    Ok(())
}

#[tokio::test]
async fn termination_drains_and_closes_the_wallet() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-close").await?;
    let wallet = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                initial_credits: Some(dec!(40)),
                ..wallet_request(&customer.id, "usd")
            },
        )
        .await?;
    state
        .wallets
        .top_up(
            &scope,
            &wallet.id,
            TopUpRequest {
                expiry_date: Some(Utc::now() - Duration::hours(1)),
                ..credits(dec!(2))
            },
        )
        .await?;

    let closed = state.wallets.terminate_wallet(&scope, &wallet.id).await?;
    assert_eq!(closed.wallet_status, WalletStatus::Closed);
    assert_eq!(closed.credit_balance, dec!(0));
    assert_eq!(closed.balance, dec!(0));

    let ledger = state
        .wallets
        .list_transactions(&scope, &wallet.id, &Pagination::default())
        .await?;
    let termination = ledger
        .items
        .iter()
        .find(|txn| txn.transaction_reason == TransactionReason::WalletTermination)
        .expect("termination debit recorded");
    assert_eq!(termination.credit_amount, dec!(42));

    assert!(matches!(
        state.wallets.terminate_wallet(&scope, &wallet.id).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    assert!(matches!(
        state.wallets.top_up(&scope, &wallet.id, credits(dec!(1))).await,
        Err(RepositoryError::InvalidOperation(_))
    ));

    let balance = state.wallets.get_balance(&scope, &wallet.id).await?;
    assert_eq!(balance.real_time_balance, dec!(0));

    // A closed wallet frees the currency for a new one.
    state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await?;
    Ok(())
}

#[tokio::test]
async fn real_time_balance_subtracts_unpaid_invoices() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-balance").await?;
    let wallet = state
        .wallets
        .create_wallet(
            &scope,
            CreateWalletRequest {
                initial_credits: Some(dec!(50)),
                conversion_rate: Some(dec!(2)),
                ..wallet_request(&customer.id, "usd")
            },
        )
        .await?;

    state
        .invoices
        .create_invoice(
            &scope,
            CreateInvoiceRequest {
                customer_id: customer.id.clone(),
                subscription_id: Some("subs_balance".into()),
                invoice_type: InvoiceType::Subscription,
                currency: "usd".into(),
                amount_due: Some(dec!(30)),
                period_start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single(),
                period_end: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).single(),
                ..Default::default()
            },
        )
        .await?;
    // Paid and foreign-currency invoices do not count.
    state
        .invoices
        .create_invoice(
            &scope,
            CreateInvoiceRequest {
                customer_id: customer.id.clone(),
                invoice_type: InvoiceType::OneOff,
                currency: "usd".into(),
                amount_due: Some(dec!(500)),
                ..Default::default()
            },
        )
        .await?;

    let balance = state.wallets.get_balance(&scope, &wallet.id).await?;
    assert_eq!(balance.wallet.balance, dec!(100));
    assert_eq!(balance.unpaid_invoice_amount, dec!(30));
    assert_eq!(balance.real_time_balance, dec!(70));
    assert_eq!(balance.real_time_credit_balance, dec!(35));
    Ok(())
}

#[tokio::test]
async fn wallets_are_scoped() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-scope").await?;
    let wallet = state
        .wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await?;

    let other = TenantScope::new("tenant_other", "env_test");
    assert!(matches!(
        state.wallets.get_wallet(&other, &wallet.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        state.wallets.top_up(&other, &wallet.id, credits(dec!(1))).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn debits_read_credits_across_pages() -> Result<()> {
    let state = setup_state().await?;
    let scope = scope();
    let customer = create_customer(&state.db, &scope, "wallet-pages").await?;
    let wallets = WalletService::new(state.db.clone(), 1);

    let wallet = wallets
        .create_wallet(&scope, wallet_request(&customer.id, "usd"))
        .await?;
    for _ in 0..3 {
        wallets.top_up(&scope, &wallet.id, credits(dec!(10))).await?;
    }

    let spent = wallets.debit(&scope, &wallet.id, debit(dec!(25))).await?;
    assert_eq!(spent.credit_balance_after, dec!(5));

    let remaining = WalletRepository::new(state.db.as_ref(), &scope)
        .credits_with_remaining(&wallet.id, 2)
        .await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].credits_available, dec!(5));

    assert!(matches!(
        wallets.debit(&scope, &wallet.id, debit(dec!(6))).await,
        Err(RepositoryError::InvalidOperation(_))
    ));
    Ok(())
}
