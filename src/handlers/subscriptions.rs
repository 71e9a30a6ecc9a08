//! # Subscription Handlers
//!
//! Lifecycle (create, cancel, pause, resume, renew), invoicing and
//! subscription schedules. Usage for usage-priced line items is supplied in
//! the request body, keyed by meter id.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, SubscriptionInvoiceRequest, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::{subscription, subscription_schedule};
use crate::repositories::subscription::SubscriptionQuery;
use crate::server::AppState;
use crate::services::invoice::{CreateInvoiceRequest, InvoiceResponse};
use crate::services::subscription::{
    CancelSubscriptionRequest, CreateScheduleRequest, CreateSubscriptionRequest, RenewResponse,
    ScheduleResponse, SubscriptionResponse, UsageRequest,
};
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/subscriptions",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Unknown customer or plan", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreateSubscriptionRequest>,
) -> CreatedResult<SubscriptionResponse> {
    let subscription = state.subscriptions.create_subscription(&scope, req).await?;
    Ok(created(subscription))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, SubscriptionQuery, Pagination),
    responses((status = 200, description = "Page of subscriptions", body = ListResult<subscription::Model>)),
    tag = "subscriptions"
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<SubscriptionQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<subscription::Model>> {
    let subscriptions = state
        .subscriptions
        .list_subscriptions(&scope, &query, &page)
        .await?;
    Ok(Json(subscriptions))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription with line items", body = SubscriptionResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<SubscriptionResponse> {
    let subscription = state.subscriptions.get_subscription(&scope, &id).await?;
    Ok(Json(subscription))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/cancel",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    request_body = CancelSubscriptionRequest,
    responses(
        (status = 200, description = "Cancelled subscription", body = subscription::Model),
        (status = 422, description = "Subscription already cancelled", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<CancelSubscriptionRequest>,
) -> ApiResult<subscription::Model> {
    let subscription = state
        .subscriptions
        .cancel(&scope, &id, req.cancel_at_period_end)
        .await?;
    Ok(Json(subscription))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/pause",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Paused subscription", body = subscription::Model),
        (status = 422, description = "Subscription is not active", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn pause_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<subscription::Model> {
    let subscription = state.subscriptions.pause(&scope, &id).await?;
    Ok(Json(subscription))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/resume",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Resumed subscription", body = subscription::Model),
        (status = 422, description = "Subscription is not paused", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn resume_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<subscription::Model> {
    let subscription = state.subscriptions.resume(&scope, &id).await?;
    Ok(Json(subscription))
}

/// Invoices the current period and advances the subscription to the next one
#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/renew",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    request_body = UsageRequest,
    responses(
        (status = 200, description = "Renewed subscription and its invoice", body = RenewResponse),
        (status = 422, description = "Subscription cannot be renewed", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn renew_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<UsageRequest>,
) -> ApiResult<RenewResponse> {
    let renewed = state.subscriptions.renew(&scope, &id, &req.usage).await?;
    Ok(Json(renewed))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/invoice",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    request_body = SubscriptionInvoiceRequest,
    responses(
        (status = 201, description = "Invoice for the period", body = InvoiceResponse),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn invoice_subscription(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<SubscriptionInvoiceRequest>,
) -> CreatedResult<InvoiceResponse> {
    let invoice = state
        .subscriptions
        .create_subscription_invoice(&scope, &id, req.period_start, req.period_end, &req.usage)
        .await?;
    Ok(created(invoice))
}

/// Invoice the current period would produce, without persisting it
#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/preview",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    request_body = UsageRequest,
    responses(
        (status = 200, description = "Invoice preview", body = CreateInvoiceRequest),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn preview_subscription_invoice(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<UsageRequest>,
) -> ApiResult<CreateInvoiceRequest> {
    let preview = state
        .subscriptions
        .preview_invoice(&scope, &id, &req.usage)
        .await?;
    Ok(Json(preview))
}

#[utoipa::path(
    post,
    path = "/v1/subscriptions/{id}/schedules",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created", body = ScheduleResponse),
        (status = 400, description = "Invalid phases", body = ApiError),
        (status = 422, description = "Subscription already has an active schedule", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<CreateScheduleRequest>,
) -> CreatedResult<ScheduleResponse> {
    let schedule = state.subscriptions.create_schedule(&scope, &id, req).await?;
    Ok(created(schedule))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions/{id}/schedules",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Schedules of the subscription", body = Vec<subscription_schedule::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn list_schedules(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<Vec<subscription_schedule::Model>> {
    let schedules = state.subscriptions.list_schedules(&scope, &id).await?;
    Ok(Json(schedules))
}

#[utoipa::path(
    get,
    path = "/v1/subscriptions/schedules/{schedule_id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("schedule_id" = String, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Schedule with phases", body = ScheduleResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(schedule_id): Path<String>,
) -> ApiResult<ScheduleResponse> {
    let schedule = state.subscriptions.get_schedule(&scope, &schedule_id).await?;
    Ok(Json(schedule))
}

/// Moves the schedule to its next phase, or applies its end behavior
#[utoipa::path(
    post,
    path = "/v1/subscriptions/schedules/{schedule_id}/advance",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("schedule_id" = String, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Advanced schedule", body = ScheduleResponse),
        (status = 422, description = "Schedule is not active", body = ApiError)
    ),
    tag = "subscriptions"
)]
pub async fn advance_schedule(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(schedule_id): Path<String>,
) -> ApiResult<ScheduleResponse> {
    let schedule = state
        .subscriptions
        .advance_schedule(&scope, &schedule_id)
        .await?;
    Ok(Json(schedule))
}
