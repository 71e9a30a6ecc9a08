//! Test utilities for database testing.
//!
//! Sets up an in-memory SQLite database with all migrations applied plus
//! catalog fixtures shared by the integration tests. The pool holds a single
//! connection so every query sees the same in-memory database.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use billing::config::AppConfig;
use billing::models::meter::{Aggregation, AggregationType};
use billing::models::{customer, meter, plan, price};
use billing::repositories::customer::NewCustomer;
use billing::repositories::meter::NewMeter;
use billing::repositories::plan::NewPlan;
use billing::repositories::price::NewPrice;
use billing::repositories::{CustomerRepository, MeterRepository, PlanRepository, PriceRepository};
use billing::server::AppState;
use billing::types::{BillingPeriod, PriceType, TenantScope};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub const OPERATOR_TOKEN: &str = "test-operator-token";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Configuration for the `test` profile with a known operator token.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        operator_tokens: vec![OPERATOR_TOKEN.to_string()],
        ..AppConfig::default()
    }
}

/// Application state over a fresh migrated database.
pub async fn setup_state() -> Result<AppState> {
    let db = setup_test_db().await?;
    Ok(AppState::new(Arc::new(test_config()), db))
}

pub fn scope() -> TenantScope {
    TenantScope::new("tenant_test", "env_test").with_user("user_test")
}

pub async fn create_customer(
    db: &DatabaseConnection,
    scope: &TenantScope,
    external_id: &str,
) -> Result<customer::Model> {
    let customer = CustomerRepository::new(db, scope)
        .create(NewCustomer {
            external_id: external_id.to_string(),
            name: format!("Customer {external_id}"),
            email: Some(format!("{external_id}@example.com")),
            ..Default::default()
        })
        .await?;
    Ok(customer)
}

pub async fn create_plan(
    db: &DatabaseConnection,
    scope: &TenantScope,
    lookup_key: &str,
) -> Result<plan::Model> {
    let plan = PlanRepository::new(db, scope)
        .create(NewPlan {
            lookup_key: Some(lookup_key.to_string()),
            name: format!("Plan {lookup_key}"),
            description: None,
            metadata: None,
        })
        .await?;
    Ok(plan)
}

pub async fn create_meter(
    db: &DatabaseConnection,
    scope: &TenantScope,
    event_name: &str,
) -> Result<meter::Model> {
    let meter = MeterRepository::new(db, scope)
        .create(NewMeter {
            event_name: event_name.to_string(),
            name: format!("Meter {event_name}"),
            aggregation: Aggregation {
                aggregation_type: AggregationType::Count,
                field: None,
            },
            filters: Vec::new(),
            reset_usage: Default::default(),
        })
        .await?;
    Ok(meter)
}

pub fn fixed_price(plan_id: &str, amount: Decimal, currency: &str) -> NewPrice {
    NewPrice {
        plan_id: plan_id.to_string(),
        amount,
        currency: currency.to_string(),
        price_type: PriceType::Fixed,
        billing_period: BillingPeriod::Monthly,
        billing_period_count: 1,
        billing_model: Default::default(),
        billing_cadence: Default::default(),
        invoice_cadence: Default::default(),
        meter_id: None,
        tier_mode: None,
        tiers: None,
        transform_quantity: None,
        lookup_key: None,
        description: None,
        metadata: None,
    }
}

pub fn usage_price(plan_id: &str, meter_id: &str, unit_amount: Decimal, currency: &str) -> NewPrice {
    NewPrice {
        price_type: PriceType::Usage,
        meter_id: Some(meter_id.to_string()),
        ..fixed_price(plan_id, unit_amount, currency)
    }
}

pub async fn create_price(
    db: &DatabaseConnection,
    scope: &TenantScope,
    input: NewPrice,
) -> Result<price::Model> {
    Ok(PriceRepository::new(db, scope).create(input).await?)
}
