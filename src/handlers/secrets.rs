//! API key handlers. The raw key is only ever present in the create
//! response.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::secret::{CreateApiKeyRequest, CreatedApiKey, SecretView};
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/secrets/api-keys",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key issued; `api_key` is shown once", body = CreatedApiKey),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "secrets"
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreateApiKeyRequest>,
) -> CreatedResult<CreatedApiKey> {
    let key = state.secrets.create_api_key(&scope, req).await?;
    Ok(created(key))
}

#[utoipa::path(
    get,
    path = "/v1/secrets/api-keys",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, Pagination),
    responses((status = 200, description = "Page of API keys", body = ListResult<SecretView>)),
    tag = "secrets"
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<SecretView>> {
    let keys = state.secrets.list_api_keys(&scope, &page).await?;
    Ok(Json(keys))
}

#[utoipa::path(
    delete,
    path = "/v1/secrets/api-keys/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Secret id")),
    responses(
        (status = 204, description = "API key revoked"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "secrets"
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.secrets.delete_api_key(&scope, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
