//! # Tests for Handlers
//!
//! Unit tests for the handlers that need no tenant scope.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use sea_orm::{ConnectOptions, Database};

use crate::config::AppConfig;
use crate::handlers::{health, root};
use crate::models::ServiceInfo;
use crate::server::AppState;

async fn sqlite_state() -> AppState {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    AppState::new(Arc::new(AppConfig::default()), db)
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "billing");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_service_info_serializes_both_fields() {
    let json = serde_json::to_value(ServiceInfo::default()).unwrap();

    assert_eq!(json["service"], "billing");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_reports_ok_with_live_database() {
    let state = sqlite_state().await;

    let (status, Json(body)) = health(State(state)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.database, "ok");
}

#[tokio::test]
async fn test_health_reports_unavailable_when_database_is_closed() {
    let state = sqlite_state().await;
    let db = state.db.as_ref().clone();
    db.close().await.unwrap();

    let (status, Json(body)) = health(State(state)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.status, "degraded");
}
