//! Prefixed string identifiers, e.g. `cust_8f14e45fceea167a5a36dedd4bea2543`.

use uuid::Uuid;

pub const ENVIRONMENT: &str = "env";
pub const CUSTOMER: &str = "cust";
pub const METER: &str = "meter";
pub const FEATURE: &str = "feat";
pub const PLAN: &str = "plan";
pub const PRICE: &str = "price";
pub const ENTITLEMENT: &str = "ent";
pub const CREDIT_GRANT: &str = "cg";
pub const SUBSCRIPTION: &str = "subs";
pub const SUBSCRIPTION_LINE_ITEM: &str = "subs_line";
pub const SUBSCRIPTION_SCHEDULE: &str = "sched";
pub const SUBSCRIPTION_SCHEDULE_PHASE: &str = "sched_phase";
pub const INVOICE: &str = "inv";
pub const INVOICE_LINE_ITEM: &str = "inv_line";
pub const WALLET: &str = "wallet";
pub const WALLET_TRANSACTION: &str = "wallet_txn";
pub const PAYMENT: &str = "pay";
pub const PAYMENT_ATTEMPT: &str = "pay_attempt";
pub const SECRET: &str = "secret";
pub const TASK: &str = "task";

/// Generates a new identifier with the given prefix.
pub fn generate(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix_and_fit_column() {
        let id = generate(SUBSCRIPTION_SCHEDULE_PHASE);
        assert!(id.starts_with("sched_phase_"));
        assert!(id.len() <= 50);
        assert_ne!(id, generate(SUBSCRIPTION_SCHEDULE_PHASE));
    }
}
