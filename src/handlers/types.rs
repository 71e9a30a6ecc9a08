//! # Common API Types
//!
//! Response helpers and small request/query types shared by the handlers.

use axum::{http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub type CreatedResult<T> = Result<(StatusCode, Json<T>), ApiError>;

/// 201 with the created resource as body.
pub fn created<T>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

/// Currency selector, e.g. `?currency=usd`
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CurrencyQuery {
    pub currency: String,
}

/// Quantity to price, e.g. `?quantity=150`
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CostQuery {
    #[param(value_type = String)]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CostResponse {
    pub price_id: String,
    pub currency: String,
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub cost: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Usage the caller is about to consume
    pub requested_usage: Option<i64>,
}

/// Invoice a subscription for an explicit period.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubscriptionInvoiceRequest {
    #[schema(value_type = String)]
    pub period_start: DateTime<Utc>,
    #[schema(value_type = String)]
    pub period_end: DateTime<Utc>,
    /// Usage per meter id
    #[serde(default)]
    #[schema(value_type = Object)]
    pub usage: std::collections::HashMap<String, Decimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FailTaskRequest {
    pub error_summary: String,
}
