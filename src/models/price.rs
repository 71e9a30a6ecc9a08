//! Price entity and the JSON shapes stored alongside it.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{
    BillingCadence, BillingModel, BillingPeriod, InvoiceCadence, PriceType, Status, TierMode,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "prices")]
#[schema(as = Price)]
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

    pub plan_id: String,
    /// Unit amount for `FLAT_FEE`, package amount for `PACKAGE`
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub display_amount: String,
    /// Lowercase ISO 4217 code
    pub currency: String,
    pub price_type: PriceType,
    pub billing_period: BillingPeriod,
    pub billing_period_count: i32,
    pub billing_model: BillingModel,
    pub billing_cadence: BillingCadence,
    pub invoice_cadence: InvoiceCadence,
    pub meter_id: Option<String>,
    pub tier_mode: Option<TierMode>,
    /// Serialized list of [`PriceTier`]
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tiers: Option<serde_json::Value>,
    /// Serialized [`TransformQuantity`]
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub transform_quantity: Option<serde_json::Value>,
    pub lookup_key: Option<String>,
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
}

impl Model {
    /// Decoded tiers; empty when the column is null.
    pub fn parsed_tiers(&self) -> Result<Vec<PriceTier>, serde_json::Error> {
        match &self.tiers {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(Vec::new()),
        }
    }

    pub fn parsed_transform_quantity(
        &self,
    ) -> Result<Option<TransformQuantity>, serde_json::Error> {
        self.transform_quantity
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }
}

/// One tier of a `TIERED` price. `up_to` is exclusive; `None` is the open
/// last tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceTier {
    #[serde(default)]
    pub up_to: Option<u64>,
    #[schema(value_type = String)]
    pub unit_amount: Decimal,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub flat_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoundMode {
    #[default]
    Up,
    Down,
}

/// Package pricing: the quantity is divided into packages of `divide_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransformQuantity {
    pub divide_by: i64,
    #[serde(default)]
    pub round: RoundMode,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
