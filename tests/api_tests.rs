//! HTTP tests driving the full router: authentication, status codes and
//! problem+json error bodies.

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use billing::server::create_app;
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{OPERATOR_TOKEN, setup_state};

async fn app() -> Result<Router> {
    Ok(create_app(setup_state().await?))
}

fn operator(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header("X-Tenant-Id", "tenant_api")
        .header("X-Environment-Id", "env_api")
}

fn with_json(builder: axum::http::request::Builder, body: Value) -> Result<Request<Body>> {
    Ok(builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let app = app().await?;
    let (status, body) = send(&app, Request::get("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");

    let (status, body) = send(&app, Request::get("/").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "billing");
    Ok(())
}

#[tokio::test]
async fn v1_requires_credentials() -> Result<()> {
    let app = app().await?;

    let response = app
        .clone()
        .oneshot(Request::get("/v1/customers").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/problem+json"
    );

    let (status, body) = send(
        &app,
        Request::get("/v1/customers")
            .header(header::AUTHORIZATION, "Bearer wrong-token")
            .header("X-Tenant-Id", "tenant_api")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        Request::get("/v1/customers")
            .header("x-api-key", "sk_unknown")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The tenant header is mandatory for operators; the environment is
    // required by every scoped handler.
    let (status, _) = send(
        &app,
        Request::get("/v1/customers")
            .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(
        &app,
        Request::get("/v1/customers")
            .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
            .header("X-Tenant-Id", "tenant_api")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    Ok(())
}

#[tokio::test]
async fn customer_crud_maps_errors_to_problem_bodies() -> Result<()> {
    let app = app().await?;
    let customer = json!({
        "external_id": "acme",
        "name": "Acme Corp",
        "email": "billing@acme.example.com"
    });

    let (status, created) = send(&app, with_json(operator("POST", "/v1/customers"), customer.clone())?).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap_or_default().to_string();
    assert!(id.starts_with("cust_"));
    assert_eq!(created["tenant_id"], "tenant_api");

    let (status, body) = send(&app, with_json(operator("POST", "/v1/customers"), customer)?).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(
        &app,
        with_json(
            operator("POST", "/v1/customers"),
            json!({ "external_id": "bad", "name": "Bad", "email": "not-an-email" }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, fetched) = send(
        &app,
        operator("GET", &format!("/v1/customers/{id}")).body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["external_id"], "acme");

    let (status, page) = send(&app, operator("GET", "/v1/customers?limit=10").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["pagination"]["limit"], 10);

    let (status, body) = send(
        &app,
        operator("GET", "/v1/customers/cust_missing").body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    // Another environment of the same tenant sees nothing.
    let (status, _) = send(
        &app,
        Request::get(format!("/v1/customers/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
            .header("X-Tenant-Id", "tenant_api")
            .header("X-Environment-Id", "env_other")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn api_keys_authenticate_within_their_scope() -> Result<()> {
    let app = app().await?;

    let (status, issued) = send(
        &app,
        with_json(
            operator("POST", "/v1/secrets/api-keys"),
            json!({ "name": "read only", "secret_type": "publishable_key", "permissions": ["read"] }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let api_key = issued["api_key"].as_str().unwrap_or_default().to_string();
    assert!(api_key.starts_with("pk_"));
    assert!(issued["secret"].get("value").is_none());

    send(
        &app,
        with_json(
            operator("POST", "/v1/customers"),
            json!({ "external_id": "keyed", "name": "Keyed" }),
        )?,
    )
    .await?;

    let (status, page) = send(
        &app,
        Request::get("/v1/customers")
            .header("x-api-key", &api_key)
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);

    let (status, body) = send(
        &app,
        with_json(
            Request::post("/v1/customers").header("x-api-key", &api_key),
            json!({ "external_id": "blocked", "name": "Blocked" }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn wallet_rules_surface_as_unprocessable() -> Result<()> {
    let app = app().await?;
    let (_, customer) = send(
        &app,
        with_json(
            operator("POST", "/v1/customers"),
            json!({ "external_id": "wallet-owner", "name": "Wallet Owner" }),
        )?,
    )
    .await?;
    let wallet = json!({ "customer_id": customer["id"], "currency": "usd", "initial_credits": "10" });

    let (status, created) = send(&app, with_json(operator("POST", "/v1/wallets"), wallet.clone())?).await?;
    assert_eq!(status, StatusCode::CREATED);
    let wallet_id = created["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = send(&app, with_json(operator("POST", "/v1/wallets"), wallet)?).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_OPERATION");

    let (status, body) = send(
        &app,
        with_json(
            operator("POST", &format!("/v1/wallets/{wallet_id}/debit")),
            json!({ "credits": "25" }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_OPERATION");
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = app().await?;
    let (status, body) = send(&app, Request::get("/openapi.json").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/customers"].is_object());
    Ok(())
}
