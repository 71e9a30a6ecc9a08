//! Invoice entity.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{BillingPeriod, PaymentStatus, Status};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "invoices")]
#[schema(as = Invoice)]
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

    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub invoice_type: InvoiceType,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount_due: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount_paid: Decimal,
    /// Always `amount_due - amount_paid`
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub amount_remaining: Decimal,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub due_date: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub paid_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub voided_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub finalized_at: Option<DateTimeWithTimeZone>,
    pub billing_period: Option<BillingPeriod>,
    #[schema(value_type = Option<String>)]
    pub period_start: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub period_end: Option<DateTimeWithTimeZone>,
    pub invoice_pdf_url: Option<String>,
    pub billing_reason: Option<BillingReason>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
    pub version: i32,
    pub invoice_number: Option<String>,
    pub billing_sequence: Option<i32>,
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
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    #[sea_orm(string_value = "SUBSCRIPTION")]
    Subscription,
    #[sea_orm(string_value = "ONE_OFF")]
    #[default]
    OneOff,
    #[sea_orm(string_value = "CREDIT")]
    Credit,
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "DRAFT")]
    #[default]
    Draft,
    #[sea_orm(string_value = "FINALIZED")]
    Finalized,
    #[sea_orm(string_value = "VOIDED")]
    Voided,
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
pub enum BillingReason {
    #[sea_orm(string_value = "SUBSCRIPTION_CREATE")]
    SubscriptionCreate,
    #[sea_orm(string_value = "SUBSCRIPTION_CYCLE")]
    SubscriptionCycle,
    #[sea_orm(string_value = "SUBSCRIPTION_UPDATE")]
    SubscriptionUpdate,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::invoice_line_item::Entity")]
    LineItem,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::invoice_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
