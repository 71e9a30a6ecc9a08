//! Price evaluation: turns a price and a quantity into a charge.

use rust_decimal::Decimal;

use super::billing_period::validate_period_count;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::price::{self, PriceTier, RoundMode};
use crate::types::{BillingModel, PriceType, TierMode, currency};

/// Cost of `quantity` units under `price`, rounded to the currency
/// precision. Non-positive quantities cost nothing.
pub fn calculate_cost(price: &price::Model, quantity: Decimal) -> RepositoryResult<Decimal> {
    if quantity <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let cost = match price.billing_model {
        BillingModel::FlatFee => price.amount.checked_mul(quantity),
        BillingModel::Package => {
            let Some(transform) = price.parsed_transform_quantity().map_err(invalid_json)? else {
                return Ok(Decimal::ZERO);
            };
            if transform.divide_by <= 0 {
                return Ok(Decimal::ZERO);
            }
            let packages = quantity / Decimal::from(transform.divide_by);
            let packages = match transform.round {
                RoundMode::Up => packages.ceil(),
                RoundMode::Down => packages.floor(),
            };
            price.amount.checked_mul(packages)
        }
        BillingModel::Tiered => {
            let tiers = sorted_tiers(price.parsed_tiers().map_err(invalid_json)?);
            if tiers.is_empty() {
                return Ok(Decimal::ZERO);
            }
            match price.tier_mode.unwrap_or_default() {
                TierMode::Volume => volume_cost(&tiers, quantity),
                TierMode::Slab => slab_cost(&tiers, quantity),
            }
        }
    };

    let cost = cost.ok_or_else(|| {
        RepositoryError::validation_error("charge exceeds the supported amount range")
    })?;
    Ok(currency::round(cost, &price.currency))
}

/// Bounded tiers ascending by `up_to`, the open tier last.
fn sorted_tiers(mut tiers: Vec<PriceTier>) -> Vec<PriceTier> {
    tiers.sort_by_key(|tier| tier.up_to.unwrap_or(u64::MAX));
    tiers
}

fn tier_charge(tier: &PriceTier, quantity: Decimal) -> Option<Decimal> {
    tier.unit_amount
        .checked_mul(quantity)?
        .checked_add(tier.flat_amount.unwrap_or_default())
}

/// The whole quantity is priced at the first tier whose bound exceeds it,
/// or at the last tier when every bound is reached.
fn volume_cost(tiers: &[PriceTier], quantity: Decimal) -> Option<Decimal> {
    let tier = tiers
        .iter()
        .find(|tier| match tier.up_to {
            Some(up_to) => Decimal::from(up_to) > quantity,
            None => true,
        })
        .or_else(|| tiers.last());

    match tier {
        Some(tier) => tier_charge(tier, quantity),
        None => Some(Decimal::ZERO),
    }
}

/// Each slice `[previous bound, up_to)` is priced at its own tier. The last
/// tier absorbs whatever remains.
fn slab_cost(tiers: &[PriceTier], quantity: Decimal) -> Option<Decimal> {
    let mut total = Decimal::ZERO;
    let mut lower = Decimal::ZERO;

    for (index, tier) in tiers.iter().enumerate() {
        let is_last = index + 1 == tiers.len();
        let upper = match tier.up_to {
            Some(up_to) if !is_last => Decimal::from(up_to).min(quantity),
            _ => quantity,
        };
        let slice = upper - lower;
        if slice <= Decimal::ZERO {
            break;
        }
        total = total.checked_add(tier_charge(tier, slice)?)?;
        lower = upper;
        if lower >= quantity {
            break;
        }
    }

    Some(total)
}

fn invalid_json(error: serde_json::Error) -> RepositoryError {
    RepositoryError::validation_error(format!("malformed price configuration: {error}"))
}

/// Shape rules every stored price satisfies.
pub fn validate_price(price: &price::Model) -> RepositoryResult<()> {
    if price.amount < Decimal::ZERO {
        return Err(RepositoryError::validation_error(
            "amount must not be negative",
        ));
    }
    validate_period_count(price.billing_period_count)?;
    if price.price_type == PriceType::Usage && price.meter_id.is_none() {
        return Err(RepositoryError::validation_error(
            "meter_id is required for usage prices",
        ));
    }

    match price.billing_model {
        BillingModel::FlatFee => {}
        BillingModel::Package => {
            let transform = price.parsed_transform_quantity().map_err(invalid_json)?;
            match transform {
                Some(transform) if transform.divide_by > 0 => {}
                _ => {
                    return Err(RepositoryError::validation_error(
                        "package prices require transform_quantity.divide_by greater than 0",
                    ));
                }
            }
        }
        BillingModel::Tiered => {
            if price.tier_mode.is_none() {
                return Err(RepositoryError::validation_error(
                    "tier_mode is required for tiered prices",
                ));
            }
            let tiers = price.parsed_tiers().map_err(invalid_json)?;
            validate_tiers(&tiers)?;
        }
    }

    Ok(())
}

fn validate_tiers(tiers: &[PriceTier]) -> RepositoryResult<()> {
    if tiers.is_empty() {
        return Err(RepositoryError::validation_error(
            "tiers are required for tiered prices",
        ));
    }

    let mut previous: Option<u64> = None;
    for (index, tier) in tiers.iter().enumerate() {
        if tier.unit_amount < Decimal::ZERO
            || tier.flat_amount.is_some_and(|flat| flat < Decimal::ZERO)
        {
            return Err(RepositoryError::validation_error(format!(
                "tier {index} has a negative amount"
            )));
        }
        match tier.up_to {
            Some(up_to) => {
                if previous.is_some_and(|prev| up_to <= prev) {
                    return Err(RepositoryError::validation_error(
                        "tier bounds must be strictly increasing",
                    ));
                }
                previous = Some(up_to);
            }
            None if index + 1 != tiers.len() => {
                return Err(RepositoryError::validation_error(
                    "only the last tier may be unbounded",
                ));
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::TransformQuantity;
    use crate::types::{BillingCadence, BillingPeriod, InvoiceCadence, Status};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn make_price(model: BillingModel, amount: Decimal) -> price::Model {
        let now = Utc::now().into();
        price::Model {
            id: "price_1".into(),
            tenant_id: "tenant_1".into(),
            environment_id: "env_1".into(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
            plan_id: "plan_1".into(),
            amount,
            display_amount: String::new(),
            currency: "usd".into(),
            price_type: PriceType::Fixed,
            billing_period: BillingPeriod::Monthly,
            billing_period_count: 1,
            billing_model: model,
            billing_cadence: BillingCadence::Recurring,
            invoice_cadence: InvoiceCadence::Advance,
            meter_id: None,
            tier_mode: None,
            tiers: None,
            transform_quantity: None,
            lookup_key: None,
            description: None,
            metadata: None,
        }
    }

    fn tiered(mode: TierMode) -> price::Model {
        let mut p = make_price(BillingModel::Tiered, Decimal::ZERO);
        p.tier_mode = Some(mode);
        p.tiers = Some(
            serde_json::to_value(vec![
                PriceTier {
                    up_to: Some(100),
                    unit_amount: dec!(1),
                    flat_amount: None,
                },
                PriceTier {
                    up_to: None,
                    unit_amount: dec!(0.5),
                    flat_amount: Some(dec!(10)),
                },
            ])
            .unwrap(),
        );
        p
    }

    fn package(divide_by: i64, round: RoundMode) -> price::Model {
        let mut p = make_price(BillingModel::Package, dec!(5));
        p.transform_quantity =
            Some(serde_json::to_value(TransformQuantity { divide_by, round }).unwrap());
        p
    }

    #[test]
    fn flat_fee_scales_with_quantity() {
        let p = make_price(BillingModel::FlatFee, dec!(9.99));
        assert_eq!(calculate_cost(&p, dec!(3)).unwrap(), dec!(29.97));
        assert_eq!(calculate_cost(&p, Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn package_rounds_per_mode() {
        assert_eq!(
            calculate_cost(&package(10, RoundMode::Up), dec!(25)).unwrap(),
            dec!(15)
        );
        assert_eq!(
            calculate_cost(&package(10, RoundMode::Down), dec!(25)).unwrap(),
            dec!(10)
        );
        assert_eq!(
            calculate_cost(&package(0, RoundMode::Up), dec!(25)).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn volume_prices_whole_quantity_at_one_tier() {
        let p = tiered(TierMode::Volume);
        assert_eq!(calculate_cost(&p, dec!(50)).unwrap(), dec!(50));
        // 100 is not below the first bound, so the open tier applies.
        assert_eq!(calculate_cost(&p, dec!(100)).unwrap(), dec!(60));
        assert_eq!(calculate_cost(&p, dec!(150)).unwrap(), dec!(85));
    }

    #[test]
    fn slab_prices_each_slice() {
        let p = tiered(TierMode::Slab);
        assert_eq!(calculate_cost(&p, dec!(50)).unwrap(), dec!(50));
        assert_eq!(calculate_cost(&p, dec!(150)).unwrap(), dec!(135));
    }

    #[test]
    fn slab_last_bounded_tier_absorbs_overflow() {
        let mut p = make_price(BillingModel::Tiered, Decimal::ZERO);
        p.tier_mode = Some(TierMode::Slab);
        p.tiers = Some(
            serde_json::to_value(vec![
                PriceTier {
                    up_to: Some(10),
                    unit_amount: dec!(2),
                    flat_amount: None,
                },
                PriceTier {
                    up_to: Some(20),
                    unit_amount: dec!(1),
                    flat_amount: None,
                },
            ])
            .unwrap(),
        );
        assert_eq!(calculate_cost(&p, dec!(30)).unwrap(), dec!(40));
    }

    #[test]
    fn oversized_charges_are_validation_errors() {
        let huge_usage = Decimal::from(10u64.pow(18));
        let flat = make_price(BillingModel::FlatFee, Decimal::from(10u64.pow(15)));
        assert!(matches!(
            calculate_cost(&flat, huge_usage),
            Err(RepositoryError::Validation(_))
        ));
        assert!(matches!(
            calculate_cost(&package(1, RoundMode::Up), Decimal::MAX),
            Err(RepositoryError::Validation(_))
        ));

        for mode in [TierMode::Volume, TierMode::Slab] {
            let mut p = make_price(BillingModel::Tiered, Decimal::ZERO);
            p.tier_mode = Some(mode);
            p.tiers = Some(
                serde_json::to_value(vec![PriceTier {
                    up_to: None,
                    unit_amount: dec!(1000),
                    flat_amount: None,
                }])
                .unwrap(),
            );
            assert!(matches!(
                calculate_cost(&p, Decimal::MAX),
                Err(RepositoryError::Validation(_))
            ));
        }
    }

    #[test]
    fn validation_rejects_bad_shapes() {
        let mut usage = make_price(BillingModel::FlatFee, dec!(1));
        usage.price_type = PriceType::Usage;
        assert!(validate_price(&usage).is_err());

        assert!(validate_price(&package(0, RoundMode::Up)).is_err());
        assert!(validate_price(&package(100, RoundMode::Up)).is_ok());

        let mut no_mode = tiered(TierMode::Volume);
        no_mode.tier_mode = None;
        assert!(validate_price(&no_mode).is_err());

        let mut open_first = tiered(TierMode::Volume);
        open_first.tiers = Some(serde_json::json!([
            { "up_to": null, "unit_amount": "1" },
            { "up_to": 10, "unit_amount": "1" }
        ]));
        assert!(validate_price(&open_first).is_err());

        assert!(validate_price(&make_price(BillingModel::FlatFee, dec!(-1))).is_err());
    }
}
