//! Subscription schedule phase.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Status;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "subscription_schedule_phases")]
#[schema(as = SubscriptionSchedulePhase)]
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

    pub schedule_id: String,
    pub phase_index: i32,
    #[schema(value_type = String)]
    pub start_date: DateTimeWithTimeZone,
    /// `None` only for the last, open-ended phase
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub commitment_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub overage_factor: Option<Decimal>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub line_items: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub credit_grants: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscription_schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::subscription_schedule::Column::Id",
        on_delete = "Cascade"
    )]
    Schedule,
}

impl Related<super::subscription_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
