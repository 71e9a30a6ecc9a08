//! # Plan Handlers
//!
//! Plans plus the prices and entitlements attached to them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::{entitlement, plan, price};
use crate::repositories::entitlement::EntitlementQuery;
use crate::repositories::plan::{NewPlan, UpdatePlan};
use crate::repositories::{EntitlementRepository, PlanRepository, PriceRepository};
use crate::server::AppState;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/plans",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewPlan,
    responses(
        (status = 201, description = "Plan created", body = plan::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Lookup key already in use", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn create_plan(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewPlan>,
) -> CreatedResult<plan::Model> {
    let plan = PlanRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(plan))
}

#[utoipa::path(
    get,
    path = "/v1/plans",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, Pagination),
    responses((status = 200, description = "Page of plans", body = ListResult<plan::Model>)),
    tag = "plans"
)]
pub async fn list_plans(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<plan::Model>> {
    let plans = PlanRepository::new(state.db.as_ref(), &scope)
        .list(&page)
        .await?;
    Ok(Json(plans))
}

#[utoipa::path(
    get,
    path = "/v1/plans/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Plan", body = plan::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn get_plan(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<plan::Model> {
    let plan = PlanRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(plan))
}

#[utoipa::path(
    put,
    path = "/v1/plans/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Plan id")),
    request_body = UpdatePlan,
    responses(
        (status = 200, description = "Updated plan", body = plan::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn update_plan(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdatePlan>,
) -> ApiResult<plan::Model> {
    let plan = PlanRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(plan))
}

#[utoipa::path(
    delete,
    path = "/v1/plans/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Plan id")),
    responses(
        (status = 204, description = "Plan deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn delete_plan(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    PlanRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/plans/{id}/prices",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Prices of the plan", body = Vec<price::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn plan_prices(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<Vec<price::Model>> {
    let db = state.db.as_ref();
    PlanRepository::new(db, &scope).get(&id).await?;
    let prices = PriceRepository::new(db, &scope).list_by_plan(&id).await?;
    Ok(Json(prices))
}

#[utoipa::path(
    get,
    path = "/v1/plans/{id}/entitlements",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, Pagination, ("id" = String, Path, description = "Plan id")),
    responses(
        (status = 200, description = "Entitlements of the plan", body = ListResult<entitlement::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn plan_entitlements(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<entitlement::Model>> {
    let db = state.db.as_ref();
    PlanRepository::new(db, &scope).get(&id).await?;
    let query = EntitlementQuery {
        plan_id: Some(id),
        feature_id: None,
    };
    let entitlements = EntitlementRepository::new(db, &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(entitlements))
}
