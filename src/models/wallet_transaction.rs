//! Wallet ledger entry.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Status;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "wallet_transactions")]
#[schema(as = WalletTransaction)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub environment_id: String,
    pub status: Status,
    #[schema(value_type = String)]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = String)]
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,

    pub wallet_id: String,
    pub transaction_type: TransactionType,
    /// Currency amount, `credit_amount * conversion_rate`
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub credit_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub credit_balance_before: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub credit_balance_after: Decimal,
    /// Unconsumed part of a credit; always zero for debits
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub credits_available: Decimal,
    #[schema(value_type = Option<String>)]
    pub expiry_date: Option<DateTimeWithTimeZone>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
    pub transaction_status: TransactionStatus,
    pub transaction_reason: TransactionReason,
    pub priority: Option<i32>,
    pub idempotency_key: Option<String>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[sea_orm(string_value = "credit")]
    Credit,
    #[sea_orm(string_value = "debit")]
    Debit,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionReason {
    #[sea_orm(string_value = "INVOICE_PAYMENT")]
    InvoicePayment,
    #[sea_orm(string_value = "FREE_CREDIT_GRANT")]
    FreeCreditGrant,
    #[sea_orm(string_value = "SUBSCRIPTION_CREDIT_GRANT")]
    SubscriptionCreditGrant,
    #[sea_orm(string_value = "PURCHASED_CREDIT_DIRECT")]
    PurchasedCreditDirect,
    #[sea_orm(string_value = "INVOICE_REFUND")]
    InvoiceRefund,
    #[sea_orm(string_value = "CREDIT_EXPIRED")]
    CreditExpired,
    #[sea_orm(string_value = "WALLET_TERMINATION")]
    WalletTermination,
    #[sea_orm(string_value = "MANUAL_BALANCE_DEBIT")]
    ManualBalanceDebit,
}

impl TransactionReason {
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            TransactionReason::FreeCreditGrant
                | TransactionReason::SubscriptionCreditGrant
                | TransactionReason::PurchasedCreditDirect
                | TransactionReason::InvoiceRefund
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id",
        on_delete = "Cascade"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
