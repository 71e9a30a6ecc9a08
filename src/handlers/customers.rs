//! # Customer Handlers
//!
//! CRUD over customers plus the customer-centric read models: invoice
//! summary, aggregated entitlements, feature access and wallets.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::types::{AccessQuery, ApiResult, CreatedResult, CurrencyQuery, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::{customer, wallet};
use crate::repositories::CustomerRepository;
use crate::repositories::customer::{CustomerFilter, NewCustomer, UpdateCustomer};
use crate::server::AppState;
use crate::services::entitlement::{AccessCheck, CustomerEntitlements};
use crate::services::invoice::CustomerInvoiceSummary;
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/customers",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = NewCustomer,
    responses(
        (status = 201, description = "Customer created", body = customer::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "External id already in use", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(input): Json<NewCustomer>,
) -> CreatedResult<customer::Model> {
    let customer = CustomerRepository::new(state.db.as_ref(), &scope)
        .create(input)
        .await?;
    Ok(created(customer))
}

#[utoipa::path(
    get,
    path = "/v1/customers",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, CustomerFilter, Pagination),
    responses(
        (status = 200, description = "Page of customers", body = ListResult<customer::Model>),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Query(filter): Query<CustomerFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<customer::Model>> {
    let customers = CustomerRepository::new(state.db.as_ref(), &scope)
        .list(&filter, &page)
        .await?;
    Ok(Json(customers))
}

#[utoipa::path(
    get,
    path = "/v1/customers/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = customer::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<customer::Model> {
    let customer = CustomerRepository::new(state.db.as_ref(), &scope)
        .get(&id)
        .await?;
    Ok(Json(customer))
}

#[utoipa::path(
    get,
    path = "/v1/customers/lookup/{external_id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("external_id" = String, Path, description = "External customer id")),
    responses(
        (status = 200, description = "Customer", body = customer::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn lookup_customer(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(external_id): Path<String>,
) -> ApiResult<customer::Model> {
    let customer = CustomerRepository::new(state.db.as_ref(), &scope)
        .get_by_external_id(&external_id)
        .await?;
    Ok(Json(customer))
}

#[utoipa::path(
    put,
    path = "/v1/customers/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Customer id")),
    request_body = UpdateCustomer,
    responses(
        (status = 200, description = "Updated customer", body = customer::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(input): Json<UpdateCustomer>,
) -> ApiResult<customer::Model> {
    let customer = CustomerRepository::new(state.db.as_ref(), &scope)
        .update(&id, input)
        .await?;
    Ok(Json(customer))
}

#[utoipa::path(
    delete,
    path = "/v1/customers/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    CustomerRepository::new(state.db.as_ref(), &scope)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Invoice totals of one customer in one currency
#[utoipa::path(
    get,
    path = "/v1/customers/{id}/invoices/summary",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, CurrencyQuery, ("id" = String, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Invoice summary", body = CustomerInvoiceSummary),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn customer_invoice_summary(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Query(query): Query<CurrencyQuery>,
) -> ApiResult<CustomerInvoiceSummary> {
    let summary = state
        .invoices
        .customer_invoice_summary(&scope, &id, &query.currency)
        .await?;
    Ok(Json(summary))
}

/// Features granted through all of the customer's active subscriptions
#[utoipa::path(
    get,
    path = "/v1/customers/{id}/entitlements",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Aggregated entitlements", body = CustomerEntitlements),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn customer_entitlements(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<CustomerEntitlements> {
    let entitlements = state.entitlements.customer_entitlements(&scope, &id).await?;
    Ok(Json(entitlements))
}

#[utoipa::path(
    get,
    path = "/v1/customers/{id}/entitlements/{lookup_key}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(
        ScopeHeaders,
        AccessQuery,
        ("id" = String, Path, description = "Customer id"),
        ("lookup_key" = String, Path, description = "Feature lookup key")
    ),
    responses(
        (status = 200, description = "Access decision", body = AccessCheck),
        (status = 404, description = "Unknown customer or feature", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn check_feature_access(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path((id, lookup_key)): Path<(String, String)>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<AccessCheck> {
    let check = state
        .entitlements
        .check_access(&scope, &id, &lookup_key, query.requested_usage)
        .await?;
    Ok(Json(check))
}

#[utoipa::path(
    get,
    path = "/v1/customers/{id}/wallets",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Wallets of the customer", body = Vec<wallet::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "customers"
)]
pub async fn customer_wallets(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<Vec<wallet::Model>> {
    let wallets = state.wallets.list_customer_wallets(&scope, &id).await?;
    Ok(Json(wallets))
}
