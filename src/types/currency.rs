//! Currency code validation and rounding.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{RepositoryError, RepositoryResult};

const DEFAULT_PRECISION: u32 = 2;
const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];
const THREE_DECIMAL: &[&str] = &["bhd", "jod", "kwd", "omr", "tnd"];

fn currency_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[a-zA-Z]{3}$").ok()).as_ref()
}

/// Validates a three-letter ISO code and returns it lowercased.
pub fn normalize(code: &str) -> RepositoryResult<String> {
    let trimmed = code.trim();
    let valid = match currency_pattern() {
        Some(pattern) => pattern.is_match(trimmed),
        None => trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()),
    };
    if !valid {
        return Err(RepositoryError::validation_error(format!(
            "invalid currency '{code}': expected a 3-letter ISO code"
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Minor-unit precision of a currency.
pub fn precision(code: &str) -> u32 {
    let code = code.to_ascii_lowercase();
    if ZERO_DECIMAL.contains(&code.as_str()) {
        0
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        3
    } else {
        DEFAULT_PRECISION
    }
}

/// Rounds half away from zero to the currency precision.
pub fn round(amount: Decimal, code: &str) -> Decimal {
    amount.round_dp_with_strategy(precision(code), RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalize_lowercases_and_rejects_garbage() {
        assert_eq!(normalize("USD").unwrap(), "usd");
        assert!(normalize("us").is_err());
        assert!(normalize("usd1").is_err());
    }

    #[test]
    fn rounding_follows_currency_precision() {
        assert_eq!(round(dec!(10.005), "usd"), dec!(10.01));
        assert_eq!(round(dec!(10.5), "jpy"), dec!(11));
        assert_eq!(round(dec!(1.2345), "kwd"), dec!(1.235));
    }
}
