//! Environment handlers. Environments are tenant-level, so these routes
//! only need the tenant half of the scope.

use axum::extract::{Path, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{AuthContext, ScopeHeaders};
use crate::error::ApiError;
use crate::models::environment;
use crate::repositories::EnvironmentRepository;
use crate::repositories::environment::NewEnvironment;
use crate::server::AppState;

#[utoipa::path(
    post,
    path = "/v1/environments",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewEnvironment,
    responses(
        (status = 201, description = "Environment created", body = environment::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "environments"
)]
pub async fn create_environment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(input): Json<NewEnvironment>,
) -> CreatedResult<environment::Model> {
    let environment = EnvironmentRepository::new(state.db.as_ref(), &auth.scope.tenant_id)
        .create(input, auth.scope.actor())
        .await?;
    Ok(created(environment))
}

#[utoipa::path(
    get,
    path = "/v1/environments",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    responses(
        (status = 200, description = "Environments of the tenant", body = Vec<environment::Model>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "environments"
)]
pub async fn list_environments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Vec<environment::Model>> {
    let environments = EnvironmentRepository::new(state.db.as_ref(), &auth.scope.tenant_id)
        .list()
        .await?;
    Ok(Json(environments))
}

#[utoipa::path(
    get,
    path = "/v1/environments/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Environment id")),
    responses(
        (status = 200, description = "Environment", body = environment::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "environments"
)]
pub async fn get_environment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<environment::Model> {
    let environment = EnvironmentRepository::new(state.db.as_ref(), &auth.scope.tenant_id)
        .get(&id)
        .await?;
    Ok(Json(environment))
}
