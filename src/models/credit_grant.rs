//! Credit grant entity. Plan-scoped grants are applied to the customer's
//! wallet whenever a subscription to the plan is created.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{BillingCadence, Status};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "credit_grants")]
#[schema(as = CreditGrant)]
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

    pub name: String,
    pub grant_scope: GrantScope,
    pub plan_id: Option<String>,
    pub subscription_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    #[schema(value_type = String)]
    pub credits: Decimal,
    pub currency: String,
    pub cadence: BillingCadence,
    pub expiration_days: Option<i32>,
    pub priority: Option<i32>,
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
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantScope {
    #[sea_orm(string_value = "PLAN")]
    Plan,
    #[sea_orm(string_value = "SUBSCRIPTION")]
    Subscription,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
