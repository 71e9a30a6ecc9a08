//! Database migrations for the billing service.
//!
//! Tables are created in dependency order so that foreign keys always point at
//! an existing table.

pub use sea_orm_migration::prelude::*;

mod common;
mod m2025_01_10_000001_create_environments_and_customers;
mod m2025_01_10_000002_create_catalog;
mod m2025_01_10_000003_create_subscriptions;
mod m2025_01_10_000004_create_invoices;
mod m2025_01_10_000005_create_wallets;
mod m2025_01_10_000006_create_payments;
mod m2025_01_10_000007_create_secrets_and_tasks;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_000001_create_environments_and_customers::Migration),
            Box::new(m2025_01_10_000002_create_catalog::Migration),
            Box::new(m2025_01_10_000003_create_subscriptions::Migration),
            Box::new(m2025_01_10_000004_create_invoices::Migration),
            Box::new(m2025_01_10_000005_create_wallets::Migration),
            Box::new(m2025_01_10_000006_create_payments::Migration),
            Box::new(m2025_01_10_000007_create_secrets_and_tasks::Migration),
        ]
    }
}
