//! Secret entity. For API keys `value` holds the keyed hash of the key,
//! never the key itself.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Status;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "secrets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub tenant_id: String,
    pub environment_id: String,
    pub status: Status,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,

    pub name: String,
    pub secret_type: SecretType,
    pub provider: SecretProvider,
    #[serde(skip_serializing)]
    pub value: String,
    pub display_id: String,
    /// JSON array of permission strings (`read`, `write`)
    #[sea_orm(column_type = "JsonBinary")]
    pub permissions: serde_json::Value,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub last_used_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn permission_list(&self) -> Vec<String> {
        self.permissions
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permission_list().iter().any(|p| p == permission)
    }
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
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    #[sea_orm(string_value = "private_key")]
    PrivateKey,
    #[sea_orm(string_value = "publishable_key")]
    PublishableKey,
    #[sea_orm(string_value = "integration")]
    Integration,
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
pub enum SecretProvider {
    #[sea_orm(string_value = "flexprice")]
    #[default]
    Flexprice,
    #[sea_orm(string_value = "stripe")]
    Stripe,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
