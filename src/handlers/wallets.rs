//! # Wallet Handlers
//!
//! Prepaid credit wallets: creation, top-ups, debits, balance, the
//! transaction ledger, credit expiry and termination.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::types::{ApiResult, CreatedResult, created};
use crate::auth::{ScopeHeaders, TenantExtension};
use crate::error::ApiError;
use crate::models::{wallet, wallet_transaction};
use crate::server::AppState;
use crate::services::wallet::{CreateWalletRequest, DebitRequest, TopUpRequest, WalletBalance};
use crate::types::{ListResult, Pagination};

#[utoipa::path(
    post,
    path = "/v1/wallets",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders),
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created", body = wallet::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 422, description = "Customer already has an active wallet in this currency", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Json(req): Json<CreateWalletRequest>,
) -> CreatedResult<wallet::Model> {
    let wallet = state.wallets.create_wallet(&scope, req).await?;
    Ok(created(wallet))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/{id}",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Wallet id")),
    responses(
        (status = 200, description = "Wallet", body = wallet::Model),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<wallet::Model> {
    let wallet = state.wallets.get_wallet(&scope, &id).await?;
    Ok(Json(wallet))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{id}/top-up",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Wallet id")),
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Credit transaction", body = wallet_transaction::Model),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 422, description = "Wallet is not active", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn top_up_wallet(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<TopUpRequest>,
) -> ApiResult<wallet_transaction::Model> {
    let transaction = state.wallets.top_up(&scope, &id, req).await?;
    Ok(Json(transaction))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{id}/debit",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Wallet id")),
    request_body = DebitRequest,
    responses(
        (status = 200, description = "Debit transaction", body = wallet_transaction::Model),
        (status = 422, description = "Insufficient balance or inactive wallet", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn debit_wallet(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Json(req): Json<DebitRequest>,
) -> ApiResult<wallet_transaction::Model> {
    let transaction = state.wallets.debit(&scope, &id, req).await?;
    Ok(Json(transaction))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/{id}/balance",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Wallet id")),
    responses(
        (status = 200, description = "Real-time balance", body = WalletBalance),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn wallet_balance(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<WalletBalance> {
    let balance = state.wallets.get_balance(&scope, &id).await?;
    Ok(Json(balance))
}

#[utoipa::path(
    get,
    path = "/v1/wallets/{id}/transactions",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, Pagination, ("id" = String, Path, description = "Wallet id")),
    responses(
        (status = 200, description = "Page of wallet transactions", body = ListResult<wallet_transaction::Model>),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn wallet_transactions(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
    Query(page): Query<Pagination>,
) -> ApiResult<ListResult<wallet_transaction::Model>> {
    let transactions = state.wallets.list_transactions(&scope, &id, &page).await?;
    Ok(Json(transactions))
}

/// Consumes the remaining credits of a credit transaction as expired
#[utoipa::path(
    post,
    path = "/v1/wallets/transactions/{id}/expire",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Credit transaction id")),
    responses(
        (status = 200, description = "Expiry debit transaction", body = wallet_transaction::Model),
        (status = 422, description = "Transaction is not an expirable credit", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn expire_credits(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<wallet_transaction::Model> {
    let transaction = state.wallets.expire_credits(&scope, &id).await?;
    Ok(Json(transaction))
}

#[utoipa::path(
    post,
    path = "/v1/wallets/{id}/terminate",
    security(("api_key" = []), ("bearer_auth" = [])),
    params(ScopeHeaders, ("id" = String, Path, description = "Wallet id")),
    responses(
        (status = 200, description = "Closed wallet", body = wallet::Model),
        (status = 422, description = "Wallet already closed", body = ApiError)
    ),
    tag = "wallets"
)]
pub async fn terminate_wallet(
    State(state): State<AppState>,
    TenantExtension(scope): TenantExtension,
    Path(id): Path<String>,
) -> ApiResult<wallet::Model> {
    let wallet = state.wallets.terminate_wallet(&scope, &id).await?;
    Ok(Json(wallet))
}
