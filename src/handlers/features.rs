//! Feature handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::feature;
use crate::repositories::FeatureRepository;
use crate::repositories::feature::{FeatureQuery, NewFeature, UpdateFeature};
use crate::server::AppState;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/features",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewFeature,
    responses(
        (status = 201, description = "Feature created", body = feature::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Lookup key already in use", body = ApiError)
    ),
    tag = "features"
)]
pub async fn create_feature(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewFeature>,
) -> CreatedResult<feature::Model> {
    let feature = FeatureRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(feature))
}

#[utoipa::path(
    get,
    path = "/v1/features",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, FeatureQuery, Pagination),
    responses((status = 200, description = "Page of features", body = ListResult<feature::Model>)),
    tag = "features"
)]
pub async fn list_features(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<FeatureQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<feature::Model>> {
    let features = FeatureRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(features))
}

#[utoipa::path(
    get,
    path = "/v1/features/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Feature id")),
    responses(
        (status = 200, description = "Feature", body = feature::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "features"
)]
pub async fn get_feature(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<feature::Model> {
    let feature = FeatureRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(feature))
}

#[utoipa::path(
    put,
    path = "/v1/features/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Feature id")),
    request_body = UpdateFeature,
    responses(
        (status = 200, description = "Updated feature", body = feature::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "features"
)]
pub async fn update_feature(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdateFeature>,
) -> ApiResult<feature::Model> {
    let feature = FeatureRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(feature))
}

#[utoipa::path(
    delete,
    path = "/v1/features/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Feature id")),
    responses(
        (status = 204, description = "Feature deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "features"
)]
pub async fn delete_feature(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    FeatureRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
