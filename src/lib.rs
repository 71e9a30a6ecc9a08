//! # Billing API Library
//!
//! Multi-tenant usage based billing: the product catalog (meters, features,
//! plans, prices, entitlements, credit grants), subscriptions, invoices,
//! prepaid wallets and payments, served over a REST API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod server;
pub mod services;
pub mod telemetry;
pub mod types;
pub use migration;
