//! # Authentication and Authorization
//!
//! Every `/v1` request authenticates one of two ways:
//!
//! - `x-api-key`: a tenant API key. The tenant and environment come from the
//!   key; `GET`/`HEAD` need the `read` permission, other methods `write`.
//! - `Authorization: Bearer <operator token>` plus `X-Tenant-Id` and
//!   `X-Environment-Id` headers.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::IntoParams;

use crate::config::AppConfig;
use crate::error::{ApiError, forbidden, unauthorized, unauthorized_with_trace_id, validation_error};
use crate::server::AppState;
use crate::services::secret::{PERMISSION_READ, PERMISSION_WRITE};
use crate::telemetry::TraceContext;
use crate::types::TenantScope;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TENANT_HEADER: &str = "X-Tenant-Id";
pub const ENVIRONMENT_HEADER: &str = "X-Environment-Id";
pub const USER_HEADER: &str = "X-User-Id";

/// How the caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey { secret_id: String },
    Operator,
}

/// Authenticated caller, inserted into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub scope: TenantScope,
    pub method: AuthMethod,
}

/// Extractor for the full tenant scope. Rejects requests without an
/// environment.
#[derive(Debug, Clone)]
pub struct TenantExtension(pub TenantScope);

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Authentication middleware for the `/v1` routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone());
    let headers = request.headers();

    let context = if let Some(raw_key) = header_str(headers, API_KEY_HEADER) {
        let secret = state
            .secrets
            .verify_api_key(raw_key)
            .await?
            .ok_or_else(|| unauthorized_with(trace_id.clone(), "Invalid API key"))?;

        let required = required_permission(request.method());
        if !secret.has_permission(required) {
            tracing::warn!(secret_id = %secret.id, required, "API key lacks permission");
            return Err(forbidden(Some("API key lacks the required permission")));
        }

        tracing::debug!(tenant_id = %secret.tenant_id, secret_id = %secret.id, "Authenticated API key request");
        AuthContext {
            scope: TenantScope::new(secret.tenant_id, secret.environment_id)
                .with_user(secret.id.clone()),
            method: AuthMethod::ApiKey {
                secret_id: secret.id,
            },
        }
    } else {
        let token = extract_bearer_token(headers, trace_id.clone())?;
        validate_token(&state.config, token)?;

        let tenant_id = header_str(headers, TENANT_HEADER).ok_or_else(|| {
            validation_error(
                "Missing required header",
                serde_json::json!({ TENANT_HEADER: "Required header is missing" }),
            )
        })?;
        let environment_id = header_str(headers, ENVIRONMENT_HEADER).unwrap_or_default();
        let mut scope = TenantScope::new(tenant_id, environment_id);
        if let Some(user_id) = header_str(headers, USER_HEADER) {
            scope = scope.with_user(user_id);
        }

        tracing::info!(tenant_id = %scope.tenant_id, environment_id = %scope.environment_id, "Authenticated operator request");
        AuthContext {
            scope,
            method: AuthMethod::Operator,
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn required_permission(method: &Method) -> &'static str {
    if method == Method::GET || method == Method::HEAD {
        PERMISSION_READ
    } else {
        PERMISSION_WRITE
    }
}

/// Non-empty, trimmed header value.
fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn unauthorized_with(trace_id: Option<String>, message: &str) -> ApiError {
    match trace_id {
        Some(trace_id) => unauthorized_with_trace_id(Some(message), trace_id),
        None => unauthorized(Some(message)),
    }
}

fn extract_bearer_token(headers: &HeaderMap, trace_id: Option<String>) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized_with(trace_id.clone(), "Missing API key or Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized_with(trace_id.clone(), "Invalid Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized_with(trace_id, "Authorization header must use Bearer scheme"))
}

fn validate_token(config: &AppConfig, token: &str) -> Result<(), ApiError> {
    let is_valid = config
        .operator_tokens
        .iter()
        .any(|configured| ConstantTimeEq::ct_eq(token.as_bytes(), configured.as_bytes()).into());

    if is_valid {
        Ok(())
    } else {
        Err(unauthorized(Some("Invalid bearer token")))
    }
}

/// OpenAPI header parameters for operator requests
#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Header)]
pub struct ScopeHeaders {
    /// Tenant identifier (operator requests only)
    #[serde(rename = "X-Tenant-Id")]
    #[param(rename = "X-Tenant-Id")]
    pub tenant_id: Option<String>,
    /// Environment identifier (operator requests only)
    #[serde(rename = "X-Environment-Id")]
    #[param(rename = "X-Environment-Id")]
    pub environment_id: Option<String>,
}

impl<S: Sync> FromRequestParts<S> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}

impl<S: Sync> FromRequestParts<S> for TenantExtension {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = AuthContext::from_request_parts(parts, state).await?;
        if context.scope.environment_id.is_empty() {
            return Err(validation_error(
                "Missing required header",
                serde_json::json!({ ENVIRONMENT_HEADER: "Required header is missing" }),
            ));
        }
        Ok(TenantExtension(context.scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
    };
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, Database};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let db = Database::connect(options).await.unwrap();
        let config = AppConfig {
            operator_tokens: vec!["test-token-123".to_string()],
            ..Default::default()
        };
        AppState::new(Arc::new(config), db)
    }

    async fn run_middleware(state: AppState, request: Request<Body>) -> Response {
        async fn handler(TenantExtension(scope): TenantExtension) -> String {
            scope.tenant_id
        }

        Router::new()
            .route("/test", get(handler).post(handler))
            .route("/open", post(|_: AuthContext| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
            .oneshot(request)
            .await
            .unwrap()
    }

    fn operator_request(token: &str) -> axum::http::request::Builder {
        Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {token}"))
            .header(TENANT_HEADER, "tenant_1")
            .header(ENVIRONMENT_HEADER, "env_1")
    }

    #[tokio::test]
    async fn missing_credentials_return_401() {
        let request = Request::builder()
            .uri("/test")
            .header(TENANT_HEADER, "tenant_1")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(test_state().await, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_auth_scheme_returns_401() {
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dGVzdDoxMjM=")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(test_state().await, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_returns_401() {
        let request = operator_request("wrong-token").body(Body::empty()).unwrap();
        let response = run_middleware(test_state().await, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_tenant_header_returns_400() {
        let request = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer test-token-123")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(test_state().await, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_environment_is_rejected_by_scoped_routes_only() {
        let state = test_state().await;
        let scoped = Request::builder()
            .uri("/test")
            .header("Authorization", "Bearer test-token-123")
            .header(TENANT_HEADER, "tenant_1")
            .body(Body::empty())
            .unwrap();
        let response = run_middleware(state.clone(), scoped).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let open = Request::builder()
            .method("POST")
            .uri("/open")
            .header("Authorization", "Bearer test-token-123")
            .header(TENANT_HEADER, "tenant_1")
            .body(Body::empty())
            .unwrap();
        let response = run_middleware(state, open).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn valid_operator_request_passes_through() {
        let request = operator_request("test-token-123").body(Body::empty()).unwrap();
        let response = run_middleware(test_state().await, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_api_key_returns_401() {
        let state = test_state().await;
        migration::Migrator::up(state.db.as_ref(), None).await.unwrap();
        let request = Request::builder()
            .uri("/test")
            .header(API_KEY_HEADER, "sk_00000000000000000000000000000000")
            .body(Body::empty())
            .unwrap();

        let response = run_middleware(state, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn read_methods_need_read_permission() {
        assert_eq!(required_permission(&Method::GET), PERMISSION_READ);
        assert_eq!(required_permission(&Method::HEAD), PERMISSION_READ);
        assert_eq!(required_permission(&Method::POST), PERMISSION_WRITE);
        assert_eq!(required_permission(&Method::DELETE), PERMISSION_WRITE);
    }
}
