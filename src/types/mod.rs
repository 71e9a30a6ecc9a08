//! Shared domain types: identifiers, request scope, pagination, currencies
//! and the billing enums used by several entities.

pub mod billing;
pub mod currency;
pub mod filter;
pub mod ids;
pub mod scope;
pub mod status;

pub use billing::{
    BillingCadence, BillingModel, BillingPeriod, InvoiceCadence, PaymentStatus, PriceType, TierMode,
};
pub use filter::{ListResult, Pagination, PaginationInfo};
pub use scope::TenantScope;
pub use status::Status;
