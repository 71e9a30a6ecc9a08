//! Billing period arithmetic.
//!
//! Month-based periods keep the anchor's day of month, clamped to the last
//! day of shorter months, so a subscription anchored on the 31st bills on
//! Feb 28 and then Mar 31 again.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::BillingPeriod;

/// Largest accepted `billing_period_count`.
pub const MAX_BILLING_PERIOD_COUNT: i32 = 1200;

/// `at` moved by `days`, or a validation error when the result leaves the
/// representable calendar.
pub fn add_days(at: DateTime<Utc>, days: i64) -> RepositoryResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(out_of_range)
}

/// Start of the period following the one that starts at `current`.
pub fn next_billing_date(
    current: DateTime<Utc>,
    anchor: DateTime<Utc>,
    period: BillingPeriod,
    count: i32,
) -> RepositoryResult<DateTime<Utc>> {
    validate_period_count(count)?;
    let count = count as u32;

    let months = match period {
        BillingPeriod::Daily => return add_days(current, i64::from(count)),
        BillingPeriod::Weekly => return add_days(current, i64::from(count) * 7),
        BillingPeriod::Monthly => Some(count),
        BillingPeriod::Quarterly => count.checked_mul(3),
        BillingPeriod::HalfYearly => count.checked_mul(6),
        BillingPeriod::Annual => count.checked_mul(12),
    };

    add_months_anchored(current, anchor.day(), months.ok_or_else(out_of_range)?)
}

pub fn validate_period_count(count: i32) -> RepositoryResult<()> {
    if !(1..=MAX_BILLING_PERIOD_COUNT).contains(&count) {
        return Err(RepositoryError::validation_error(format!(
            "billing_period_count must be between 1 and {MAX_BILLING_PERIOD_COUNT}"
        )));
    }
    Ok(())
}

/// End of the period starting at `start`.
pub fn period_end_for(
    start: DateTime<Utc>,
    anchor: DateTime<Utc>,
    period: BillingPeriod,
    count: i32,
) -> RepositoryResult<DateTime<Utc>> {
    next_billing_date(start, anchor, period, count)
}

/// Share of `[period_start, period_end)` still ahead of `from`, in `[0, 1]`.
pub fn proration_coefficient(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    from: DateTime<Utc>,
) -> Decimal {
    let total = (period_end - period_start).num_seconds();
    if total <= 0 {
        return Decimal::ZERO;
    }
    let remaining = (period_end - from).num_seconds().clamp(0, total);
    Decimal::from(remaining) / Decimal::from(total)
}

fn add_months_anchored(
    current: DateTime<Utc>,
    anchor_day: u32,
    months: u32,
) -> RepositoryResult<DateTime<Utc>> {
    let first_of_target = current
        .date_naive()
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(months)))
        .ok_or_else(out_of_range)?;
    let day = anchor_day.min(days_in_month(first_of_target).ok_or_else(out_of_range)?);
    let date = first_of_target.with_day(day).ok_or_else(out_of_range)?;

    Ok(date.and_time(current.time()).and_utc())
}

fn out_of_range() -> RepositoryError {
    RepositoryError::validation_error("billing date out of range")
}

fn days_in_month(first: NaiveDate) -> Option<u32> {
    let next = first.checked_add_months(Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn monthly_clamps_to_short_months_and_recovers() {
        let anchor = at(2025, 1, 31);
        let feb = next_billing_date(anchor, anchor, BillingPeriod::Monthly, 1).unwrap();
        assert_eq!(feb, at(2025, 2, 28));
        let mar = next_billing_date(feb, anchor, BillingPeriod::Monthly, 1).unwrap();
        assert_eq!(mar, at(2025, 3, 31));
    }

    #[test]
    fn leap_year_february() {
        let anchor = at(2024, 1, 30);
        assert_eq!(
            next_billing_date(anchor, anchor, BillingPeriod::Monthly, 1).unwrap(),
            at(2024, 2, 29)
        );
    }

    #[test]
    fn multi_unit_periods() {
        let start = at(2025, 1, 15);
        assert_eq!(
            next_billing_date(start, start, BillingPeriod::Daily, 3).unwrap(),
            at(2025, 1, 18)
        );
        assert_eq!(
            next_billing_date(start, start, BillingPeriod::Weekly, 2).unwrap(),
            at(2025, 1, 29)
        );
        assert_eq!(
            next_billing_date(start, start, BillingPeriod::Quarterly, 1).unwrap(),
            at(2025, 4, 15)
        );
        assert_eq!(
            next_billing_date(start, start, BillingPeriod::HalfYearly, 1).unwrap(),
            at(2025, 7, 15)
        );
        assert_eq!(
            period_end_for(start, start, BillingPeriod::Annual, 2).unwrap(),
            at(2027, 1, 15)
        );
    }

    #[test]
    fn zero_count_is_rejected() {
        let start = at(2025, 1, 15);
        assert!(next_billing_date(start, start, BillingPeriod::Monthly, 0).is_err());
        assert!(
            next_billing_date(start, start, BillingPeriod::Annual, MAX_BILLING_PERIOD_COUNT + 1)
                .is_err()
        );
        assert!(
            next_billing_date(start, start, BillingPeriod::Annual, MAX_BILLING_PERIOD_COUNT)
                .is_ok()
        );
    }

    #[test]
    fn dates_past_the_calendar_are_errors() {
        let end_of_time = DateTime::<Utc>::MAX_UTC;
        for period in [BillingPeriod::Daily, BillingPeriod::Weekly, BillingPeriod::Annual] {
            assert!(next_billing_date(end_of_time, end_of_time, period, 1).is_err());
        }
        assert!(add_days(at(2025, 1, 1), i64::MAX).is_err());
        assert!(add_days(at(2025, 1, 1), i64::from(u32::MAX)).is_err());
        assert_eq!(add_days(at(2025, 1, 1), 14).unwrap(), at(2025, 1, 15));
    }

    #[test]
    fn proration_is_bounded() {
        let start = at(2025, 4, 1);
        let end = at(2025, 5, 1);
        assert_eq!(proration_coefficient(start, end, at(2025, 4, 16)), dec!(0.5));
        assert_eq!(proration_coefficient(start, end, at(2025, 3, 1)), Decimal::ONE);
        assert_eq!(proration_coefficient(start, end, at(2025, 6, 1)), Decimal::ZERO);
        assert_eq!(proration_coefficient(end, start, start), Decimal::ZERO);
    }
}
