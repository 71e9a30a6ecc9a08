//! Invoice handlers.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::invoice;
use crate::repositories::invoice::InvoiceQuery;
use crate::server::AppState;
use crate::services::invoice::{CreateInvoiceRequest, InvoiceResponse, UpdatePaymentStatusRequest};
use crate::types::{ListResult, Pagination};

/// Creates an invoice. Retrying with the same idempotency key returns the
/// existing invoice.
#[utoipa::path(
    post,
    path = "/v1/invoices",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Unknown customer or subscription", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreateInvoiceRequest>,
) -> CreatedResult<InvoiceResponse> {
    let invoice = state.invoices.create_invoice(&scope, req).await?;
    Ok(created(invoice))
}

#[utoipa::path(
    get,
    path = "/v1/invoices",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, InvoiceQuery, Pagination),
    responses((status = 200, description = "Page of invoices", body = ListResult<invoice::Model>)),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(query): Query<InvoiceQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<invoice::Model>> {
    let invoices = state.invoices.list_invoices(&scope, &query, &page).await?;
    Ok(Json(invoices))
}

#[utoipa::path(
    get,
    path = "/v1/invoices/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with line items", body = InvoiceResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<InvoiceResponse> {
    let invoice = state.invoices.get_invoice(&scope, &id).await?;
    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/v1/invoices/{id}/finalize",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Finalized invoice", body = invoice::Model),
        (status = 422, description = "Invoice is not a draft", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn finalize_invoice(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<invoice::Model> {
    let invoice = state.invoices.finalize_invoice(&scope, &id).await?;
    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/v1/invoices/{id}/void",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Voided invoice", body = invoice::Model),
        (status = 422, description = "Invoice is paid or already voided", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn void_invoice(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<invoice::Model> {
    let invoice = state.invoices.void_invoice(&scope, &id).await?;
    Ok(Json(invoice))
}

#[utoipa::path(
    put,
    path = "/v1/invoices/{id}/payment",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Invoice id")),
    request_body = UpdatePaymentStatusRequest,
    responses(
        (status = 200, description = "Invoice with updated payment status", body = invoice::Model),
        (status = 400, description = "Invalid amount", body = ApiError),
        (status = 422, description = "Transition not allowed", body = ApiError)
    ),
    tag = "invoices"
)]
pub async fn update_invoice_payment(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> ApiResult<invoice::Model> {
    let invoice = state
        .invoices
        .update_payment_status(&scope, &id, req)
        .await?;
    Ok(Json(invoice))
}
