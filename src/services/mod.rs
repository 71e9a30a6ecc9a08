//! Billing services composed on top of the repositories.
//!
//! Services own the multi-row workflows (invoice issuance, wallet ledger
//! moves, payment processing) and run each of them in one database
//! transaction. Functions suffixed `_in` take the connection explicitly so a
//! caller can compose them inside its own transaction.

pub mod billing_period;
pub mod entitlement;
pub mod invoice;
pub mod payment;
pub mod pricing;
pub mod secret;
pub mod subscription;
pub mod wallet;

pub use entitlement::EntitlementService;
pub use invoice::InvoiceService;
pub use payment::PaymentService;
pub use secret::SecretService;
pub use subscription::SubscriptionService;
pub use wallet::WalletService;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::error::{RepositoryError, RepositoryResult};

pub(crate) fn to_utc(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

/// Sum of `amounts`, or a validation error when it leaves the decimal range.
pub(crate) fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> RepositoryResult<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| RepositoryError::validation_error("total exceeds the supported amount range"))
}
