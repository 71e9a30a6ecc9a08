//! Meter entity: how raw usage events for one event name are aggregated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Status;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "meters")]
#[schema(as = Meter)]
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

    pub event_name: String,
    pub name: String,
    /// Serialized [`Aggregation`]
    #[sea_orm(column_type = "JsonBinary")]
    pub aggregation: serde_json::Value,
    /// Serialized list of [`MeterFilter`]
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub filters: Option<serde_json::Value>,
    pub reset_usage: ResetUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationType {
    Count,
    Sum,
    Avg,
    CountUnique,
    Max,
    Latest,
}

impl AggregationType {
    /// Every aggregation except `COUNT` reads a property of the event.
    pub fn requires_field(self) -> bool {
        !matches!(self, AggregationType::Count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Aggregation {
    #[serde(rename = "type")]
    pub aggregation_type: AggregationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Restricts a meter to events whose property `key` is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MeterFilter {
    pub key: String,
    pub values: Vec<String>,
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
pub enum ResetUsage {
    #[sea_orm(string_value = "BILLING_PERIOD")]
    #[default]
    BillingPeriod,
    #[sea_orm(string_value = "NEVER")]
    Never,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
