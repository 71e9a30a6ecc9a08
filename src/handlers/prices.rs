//! Price handlers, including the cost calculator.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CostQuery, CostResponse, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::price;
use crate::repositories::PriceRepository;
use crate::repositories::price::{NewPrice, PriceQuery, UpdatePrice};
use crate::server::AppState;
use crate::services::pricing::calculate_cost;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/prices",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewPrice,
    responses(
        (status = 201, description = "Price created", body = price::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Unknown plan or meter", body = ApiError)
    ),
    tag = "prices"
)]
pub async fn create_price(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewPrice>,
) -> CreatedResult<price::Model> {
    let price = PriceRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(price))
}

#[utoipa::path(
    get,
    path = "/v1/prices",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, PriceQuery, Pagination),
    responses((status = 200, description = "Page of prices", body = ListResult<price::Model>)),
    tag = "prices"
)]
pub async fn list_prices(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<PriceQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<price::Model>> {
    let prices = PriceRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(prices))
}

#[utoipa::path(
    get,
    path = "/v1/prices/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Price id")),
    responses(
        (status = 200, description = "Price", body = price::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "prices"
)]
pub async fn get_price(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<price::Model> {
    let price = PriceRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(price))
}

#[utoipa::path(
    put,
    path = "/v1/prices/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Price id")),
    request_body = UpdatePrice,
    responses(
        (status = 200, description = "Updated price", body = price::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "prices"
)]
pub async fn update_price(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdatePrice>,
) -> ApiResult<price::Model> {
    let price = PriceRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(price))
}

#[utoipa::path(
    delete,
    path = "/v1/prices/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Price id")),
    responses(
        (status = 204, description = "Price deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "prices"
)]
pub async fn delete_price(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    PriceRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cost of a quantity under the price's billing model
#[utoipa::path(
    get,
    path = "/v1/prices/{id}/cost",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, CostQuery, ("id" = String, Path, description = "Price id")),
    responses(
        (status = 200, description = "Calculated cost", body = CostResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "prices"
)]
pub async fn price_cost(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Query(query): Query<CostQuery>,
) -> ApiResult<CostResponse> {
    let price = PriceRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    let cost = calculate_cost(&price, query.quantity)?;
    Ok(Json(CostResponse {
        price_id: price.id,
        currency: price.currency,
        quantity: query.quantity,
        cost,
    }))
}
