//! # Data Models
//!
//! SeaORM entities for every billing table. Each module holds the entity and
//! the enums stored in its columns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod billing_sequence;
pub mod credit_grant;
pub mod customer;
pub mod entitlement;
pub mod environment;
pub mod feature;
pub mod invoice;
pub mod invoice_line_item;
pub mod invoice_sequence;
pub mod meter;
pub mod payment;
pub mod payment_attempt;
pub mod plan;
pub mod price;
pub mod secret;
pub mod subscription;
pub mod subscription_line_item;
pub mod subscription_schedule;
pub mod subscription_schedule_phase;
pub mod task;
pub mod wallet;
pub mod wallet_transaction;

pub use customer::Entity as Customer;
pub use invoice::Entity as Invoice;
pub use plan::Entity as Plan;
pub use subscription::Entity as Subscription;
pub use wallet::Entity as Wallet;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "billing".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
