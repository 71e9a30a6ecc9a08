//! Subscription line item: one price copied from the plan onto a
//! subscription.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{BillingPeriod, InvoiceCadence, PriceType, Status};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "subscription_line_items")]
#[schema(as = SubscriptionLineItem)]
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

    pub subscription_id: String,
    pub customer_id: String,
    pub plan_id: Option<String>,
    pub plan_display_name: Option<String>,
    pub price_id: String,
    pub price_type: PriceType,
    pub meter_id: Option<String>,
    pub meter_display_name: Option<String>,
    pub display_name: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub quantity: Decimal,
    pub currency: String,
    pub billing_period: BillingPeriod,
    pub invoice_cadence: InvoiceCadence,
    #[schema(value_type = Option<String>)]
    pub start_date: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::Id",
        on_delete = "Cascade"
    )]
    Subscription,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
