use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status shared by every row. Deletes are soft and set `deleted`.
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
pub enum Status {
    #[sea_orm(string_value = "published")]
    #[default]
    Published,
    #[sea_orm(string_value = "deleted")]
    Deleted,
    #[sea_orm(string_value = "archived")]
    Archived,
}
