//! Credit grant handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::credit_grant;
use crate::repositories::CreditGrantRepository;
use crate::repositories::credit_grant::{CreditGrantQuery, NewCreditGrant};
use crate::server::AppState;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/credit-grants",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewCreditGrant,
    responses(
        (status = 201, description = "Credit grant created", body = credit_grant::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Unknown plan or subscription", body = ApiError)
    ),
    tag = "credit-grants"
)]
pub async fn create_credit_grant(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewCreditGrant>,
) -> CreatedResult<credit_grant::Model> {
    let grant = CreditGrantRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(grant))
}

#[utoipa::path(
    get,
    path = "/v1/credit-grants",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, CreditGrantQuery, Pagination),
    responses((status = 200, description = "Page of credit grants", body = ListResult<credit_grant::Model>)),
    tag = "credit-grants"
)]
pub async fn list_credit_grants(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<CreditGrantQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<credit_grant::Model>> {
    let grants = CreditGrantRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(grants))
}

#[utoipa::path(
    get,
    path = "/v1/credit-grants/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Credit grant id")),
    responses(
        (status = 200, description = "Credit grant", body = credit_grant::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "credit-grants"
)]
pub async fn get_credit_grant(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<credit_grant::Model> {
    let grant = CreditGrantRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(grant))
}

#[utoipa::path(
    delete,
    path = "/v1/credit-grants/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Credit grant id")),
    responses(
        (status = 204, description = "Credit grant deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "credit-grants"
)]
pub async fn delete_credit_grant(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    CreditGrantRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
