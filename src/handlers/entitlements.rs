//! Entitlement handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::entitlement;
use crate::repositories::EntitlementRepository;
use crate::repositories::entitlement::{EntitlementQuery, UpdateEntitlement};
use crate::server::AppState;
use crate::services::entitlement::CreateEntitlementRequest;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/entitlements",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreateEntitlementRequest,
    responses(
        (status = 201, description = "Entitlement created", body = entitlement::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Plan already grants the feature", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn create_entitlement(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreateEntitlementRequest>,
) -> CreatedResult<entitlement::Model> {
    let entitlement = state.entitlements.create_entitlement(&scope, req).await?;
    Ok(created(entitlement))
}

#[utoipa::path(
    get,
    path = "/v1/entitlements",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, EntitlementQuery, Pagination),
    responses((status = 200, description = "Page of entitlements", body = ListResult<entitlement::Model>)),
    tag = "entitlements"
)]
pub async fn list_entitlements(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<EntitlementQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<entitlement::Model>> {
    let entitlements = EntitlementRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(entitlements))
}

#[utoipa::path(
    get,
    path = "/v1/entitlements/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Entitlement id")),
    responses(
        (status = 200, description = "Entitlement", body = entitlement::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn get_entitlement(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<entitlement::Model> {
    let entitlement = EntitlementRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(entitlement))
}

#[utoipa::path(
    put,
    path = "/v1/entitlements/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Entitlement id")),
    request_body = UpdateEntitlement,
    responses(
        (status = 200, description = "Updated entitlement", body = entitlement::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn update_entitlement(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdateEntitlement>,
) -> ApiResult<entitlement::Model> {
    let entitlement = EntitlementRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(entitlement))
}

#[utoipa::path(
    delete,
    path = "/v1/entitlements/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Entitlement id")),
    responses(
        (status = 204, description = "Entitlement deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn delete_entitlement(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    EntitlementRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
