//! Import/export task handlers. Tasks only track state here; the file
//! processing itself runs elsewhere and reports progress through these
//! routes.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, FailTaskRequest, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::task;
use crate::repositories::TaskRepository;
use crate::repositories::task::{NewTask, TaskProgress, TaskQuery};
use crate::server::AppState;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/tasks",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created as PENDING", body = task::Model),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewTask>,
) -> CreatedResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(task))
}

#[utoipa::path(
    get,
    path = "/v1/tasks",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, TaskQuery, Pagination),
    responses((status = 200, description = "Page of tasks", body = ListResult<task::Model>)),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<TaskQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<task::Model>> {
    let tasks = TaskRepository::new(state.db.as_ref(), &scope)
        .list(&query, &page)
        .await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = task::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/start",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task is PROCESSING", body = task::Model),
        (status = 422, description = "Task is not pending", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn start_task(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .start(&id)
        .await?;
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/v1/tasks/{id}/progress",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Task id")),
    request_body = TaskProgress,
    responses(
        (status = 200, description = "Updated counters", body = task::Model),
        (status = 400, description = "Counters exceed total_records", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn update_task_progress(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(progress): Json<TaskProgress>,
) -> ApiResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .update_progress(&id, progress)
        .await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/complete",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task is COMPLETED", body = task::Model),
        (status = 422, description = "Task is not processing", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn complete_task(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .complete(&id)
        .await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/fail",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Task id")),
    request_body = FailTaskRequest,
    responses(
        (status = 200, description = "Task is FAILED", body = task::Model),
        (status = 422, description = "Task already finished", body = ApiError)
    ),
    tag = "tasks"
)]
pub async fn fail_task(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<FailTaskRequest>,
) -> ApiResult<task::Model> {
    let task = TaskRepository::new(state.db.as_ref(), &scope)
        .fail(&id, req.error_summary)
        .await?;
    Ok(Json(task))
}
