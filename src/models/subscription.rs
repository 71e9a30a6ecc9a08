//! Subscription entity: a customer's enrolment in a plan for one currency
//! and billing period.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{BillingCadence, BillingPeriod, Status};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "subscriptions")]
#[schema(as = Subscription)]
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

    pub lookup_key: Option<String>,
    pub customer_id: String,
    pub plan_id: String,
    pub subscription_status: SubscriptionStatus,
    pub currency: String,
    #[schema(value_type = String)]
    pub billing_anchor: DateTimeWithTimeZone,
    #[schema(value_type = String)]
    pub start_date: DateTimeWithTimeZone,
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTimeWithTimeZone>,
    #[schema(value_type = String)]
    pub current_period_start: DateTimeWithTimeZone,
    #[schema(value_type = String)]
    pub current_period_end: DateTimeWithTimeZone,
    #[schema(value_type = Option<String>)]
    pub cancelled_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub cancel_at: Option<DateTimeWithTimeZone>,
    pub cancel_at_period_end: bool,
    #[schema(value_type = Option<String>)]
    pub trial_start: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub trial_end: Option<DateTimeWithTimeZone>,
    pub billing_cadence: BillingCadence,
    pub billing_period: BillingPeriod,
    pub billing_period_count: i32,
    /// Bumped on every state change
    pub version: i32,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
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
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "incomplete")]
    Incomplete,
    #[sea_orm(string_value = "incomplete_expired")]
    IncompleteExpired,
    #[sea_orm(string_value = "past_due")]
    PastDue,
    #[sea_orm(string_value = "trialing")]
    Trialing,
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
    #[sea_orm(has_many = "super::subscription_line_item::Entity")]
    LineItem,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::subscription_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
