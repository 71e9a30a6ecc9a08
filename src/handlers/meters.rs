//! Meter handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::meter;
use crate::repositories::MeterRepository;
use crate::repositories::meter::{MeterQuery, NewMeter, UpdateMeter};
use crate::server::AppState;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/meters",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewMeter,
    responses(
        (status = 201, description = "Meter created", body = meter::Model),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "meters"
)]
pub async fn create_meter(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewMeter>,
) -> CreatedResult<meter::Model> {
    let meter = MeterRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(meter))
}

#[utoipa::path(
    get,
    path = "/v1/meters",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, MeterQuery, Pagination),
    responses((status = 200, description = "Page of meters", body = ListResult<meter::Model>)),
    tag = "meters"
)]
pub async fn list_meters(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<MeterQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<meter::Model>> {
    let meters = MeterRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(meters))
}

#[utoipa::path(
    get,
    path = "/v1/meters/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Meter", body = meter::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "meters"
)]
pub async fn get_meter(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<meter::Model> {
    let meter = MeterRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(meter))
}

#[utoipa::path(
    put,
    path = "/v1/meters/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Meter id")),
    request_body = UpdateMeter,
    responses(
        (status = 200, description = "Updated meter", body = meter::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "meters"
)]
pub async fn update_meter(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdateMeter>,
) -> ApiResult<meter::Model> {
    let meter = MeterRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(meter))
}

#[utoipa::path(
    delete,
    path = "/v1/meters/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Meter id")),
    responses(
        (status = 204, description = "Meter deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "meters"
)]
pub async fn delete_meter(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    MeterRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
