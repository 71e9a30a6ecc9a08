//! Payment handlers.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::{payment, payment_attempt};
use crate::repositories::payment::PaymentQuery;
use crate::server::AppState;
use crate::services::payment::{CreatePaymentRequest, PaymentResponse};
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/payments",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = PaymentResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Idempotency key already used", body = ApiError),
        (status = 422, description = "Invoice cannot be paid", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreatePaymentRequest>,
) -> CreatedResult<PaymentResponse> {
    let payment = state.payments.create_payment(&scope, req).await?;
    Ok(created(payment))
}

#[utoipa::path(
    get,
    path = "/v1/payments",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, PaymentQuery, Pagination),
    responses((status = 200, description = "Page of payments", body = ListResult<payment::Model>)),
    tag = "payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<PaymentQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<payment::Model>> {
    let payments = state.payments.list_payments(&scope, &query, &page).await?;
    Ok(Json(payments))
}

#[utoipa::path(
    get,
    path = "/v1/payments/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment with attempts", body = PaymentResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<PaymentResponse> {
    let payment = state.payments.get_payment(&scope, &id).await?;
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/v1/payments/{id}/process",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment after the attempt", body = PaymentResponse),
        (status = 422, description = "Payment is not processable", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<PaymentResponse> {
    let payment = state.payments.process_payment(&scope, &id).await?;
    Ok(Json(payment))
}

#[utoipa::path(
    get,
    path = "/v1/payments/{id}/attempts",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Attempts, oldest first", body = Vec<payment_attempt::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "payments"
)]
pub async fn payment_attempts(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<Vec<payment_attempt::Model>> {
    let attempts = state.payments.list_attempts(&scope, &id).await?;
    Ok(Json(attempts))
}
